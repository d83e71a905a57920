use super::slippage::SlippageModel;
use crate::utils::constants::{BASIS_POINTS, BIN_WIDTH_FRACTION};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumIter, EnumString, VariantNames};

/// Exchange mechanism family. Each family owns one trade function.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, EnumString, VariantNames, EnumIter, Deserialize, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurveClass {
    ConstantProduct,
    ConcentratedLiquidity,
    BinBased,
}

/// Supported exchange programs. Anything the refresher cannot name maps to `Unknown`,
/// which the price graph refuses.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, EnumString, VariantNames, EnumIter, Default, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DexKind {
    #[default]
    Unknown,
    RaydiumAmm,
    RaydiumCp,
    RaydiumClmm,
    PumpAmm,
    MeteoraDamm,
    MeteoraDammV2,
    MeteoraDlmm,
    Whirlpool,
}

impl DexKind {
    pub fn curve_class(&self) -> Option<CurveClass> {
        match self {
            DexKind::Unknown => None,
            DexKind::RaydiumAmm | DexKind::RaydiumCp | DexKind::PumpAmm | DexKind::MeteoraDamm | DexKind::MeteoraDammV2 => {
                Some(CurveClass::ConstantProduct)
            }
            DexKind::RaydiumClmm | DexKind::Whirlpool => Some(CurveClass::ConcentratedLiquidity),
            DexKind::MeteoraDlmm => Some(CurveClass::BinBased),
        }
    }

    pub fn is_known(&self) -> bool {
        self.curve_class().is_some()
    }

    /// Parse a wire tag, mapping unrecognised tags to `Unknown` instead of failing.
    pub fn parse_lossy(tag: &str) -> DexKind {
        tag.parse().unwrap_or_default()
    }

    /// Serde adapter for inbound events: an unrecognised tag must reach the graph boundary
    /// as `Unknown` so it is rejected there rather than failing the whole batch decode.
    pub fn deserialize_lossy<'de, D>(deserializer: D) -> Result<DexKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(DexKind::parse_lossy(&tag))
    }
}

impl CurveClass {
    /// Output of one leg for `amount_in`, with the fee taken on input and the
    /// slippage penalty applied multiplicatively to the quoted output.
    pub fn apply_trade(&self, price: f64, fee_bps: u32, depth: f64, amount_in: f64, slippage: &SlippageModel) -> f64 {
        if amount_in <= 0.0 || depth <= 0.0 {
            return 0.0;
        }
        let net_in = amount_in * (1.0 - fee_bps as f64 / BASIS_POINTS);
        let quoted = net_in * price;
        let ratio = match self {
            CurveClass::ConstantProduct | CurveClass::ConcentratedLiquidity => net_in / depth,
            // Liquidity sits in discrete bins: the price only moves once a whole bin is consumed.
            CurveClass::BinBased => (net_in / depth / BIN_WIDTH_FRACTION).ceil() * BIN_WIDTH_FRACTION,
        };
        slippage.attenuate(quoted, ratio).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DexKind::Unknown), "UNKNOWN");
        assert_eq!(format!("{}", DexKind::RaydiumClmm), "RAYDIUM_CLMM");
        assert_eq!(format!("{}", DexKind::MeteoraDammV2), "METEORA_DAMM_V2");
        assert_eq!(format!("{}", CurveClass::BinBased), "BIN_BASED");
    }

    #[test]
    fn test_curve_class_mapping() {
        assert_eq!(DexKind::PumpAmm.curve_class(), Some(CurveClass::ConstantProduct));
        assert_eq!(DexKind::Whirlpool.curve_class(), Some(CurveClass::ConcentratedLiquidity));
        assert_eq!(DexKind::MeteoraDlmm.curve_class(), Some(CurveClass::BinBased));
        assert!(!DexKind::Unknown.is_known());
    }

    #[test]
    fn test_lossy_parse() {
        assert_eq!(DexKind::parse_lossy("WHIRLPOOL"), DexKind::Whirlpool);
        assert_eq!(DexKind::parse_lossy("PHOENIX"), DexKind::Unknown);
    }

    #[test]
    fn test_lossy_deserialize() -> eyre::Result<()> {
        #[derive(Deserialize)]
        struct Event {
            #[serde(deserialize_with = "DexKind::deserialize_lossy")]
            dex_kind: DexKind,
        }
        let known: Event = serde_json::from_str(r#"{"dex_kind":"RAYDIUM_CP"}"#)?;
        let unknown: Event = serde_json::from_str(r#"{"dex_kind":"SOMETHING_NEW"}"#)?;
        assert_eq!(known.dex_kind, DexKind::RaydiumCp);
        assert_eq!(unknown.dex_kind, DexKind::Unknown);
        Ok(())
    }

    #[test]
    fn test_apply_trade_fee_and_slippage() {
        let no_slippage = SlippageModel::new(0.0, 0.0);
        let out = CurveClass::ConstantProduct.apply_trade(2.0, 30, 1_000_000.0, 100.0, &no_slippage);
        assert!((out - 199.4).abs() < 1e-9);

        let slippage = SlippageModel::new(0.0, 10_000.0);
        let out = CurveClass::ConstantProduct.apply_trade(1.0, 0, 1_000.0, 100.0, &slippage);
        // 10% of depth costs 10%
        assert!((out - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_bin_based_slippage_is_stepwise() {
        let slippage = SlippageModel::new(0.0, 10_000.0);
        let small = CurveClass::BinBased.apply_trade(1.0, 0, 1_000.0, 1.0, &slippage);
        let larger = CurveClass::BinBased.apply_trade(1.0, 0, 1_000.0, 9.0, &slippage);
        // both trades stay inside the first bin and pay the same rate
        assert!((small / 1.0 - larger / 9.0).abs() < 1e-12);
    }
}
