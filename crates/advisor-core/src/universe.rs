//! Static ETF universe: ticker lists, theme lookup, display names.
//!
//! Enumerated once per process; prices for the universe are fetched per
//! cache cycle by the gateway.

use crate::types::Theme;

/// Korean ETFs (six-digit codes).
pub const KR_ETFS: &[&str] = &[
    "069500", "102110", "114800", "132030", "133690", "148020", "153130", "232080", "251340",
    "278530", "277630", "309210", "305720", "364990", "371460", "379800", "381170", "453950",
    "091160", "069660", "280940", "114460", "130680", "305050", "379780", "261240", "381560",
    "148070", "122630", "139660", "139670", "143850", "152100", "157490", "182490", "195930",
    "200250", "217770", "233740", "251350", "267770", "269420", "273130", "228800", "292050",
    "295820", "315960", "272650",
];

/// US ETFs across sectors, styles, themes, bonds and international exposure.
pub const US_ETFS: &[&str] = &[
    "SPY", "VOO", "VTI", "IWM", "QQQ", "XLK", "XLF", "XLY", "XLP", "XLI", "XLU", "XLC", "XLB",
    "VTV", "VUG", "VB", "VEA", "VWO", "AGG", "BND", "TLT", "IEF", "SHY", "LQD", "HYG", "TIP",
    "GLD", "SLV", "DBC", "USO", "UNG", "PPLT", "ARKK", "BOTZ", "TAN", "ICLN", "PBW", "PLUG",
    "VNQ", "SCHH", "IYR", "EFA", "EEM", "IEFA", "EMB", "SCHD", "DIA", "EWY", "EWZ", "EWU",
    "EWH", "EWG", "EWC", "EWJ", "EWT", "XLE", "XLV", "XLRE", "XME", "XBI", "XRT", "XHB", "XOP",
    "KRE", "KBE", "ITB", "IHI", "VBK", "VBR", "VEU", "VSS", "VGK", "VPL", "VGT", "VDC", "VDE",
    "VFH", "VHT", "VIS", "SOXX", "SMH", "FINX", "HACK", "ROBO", "ESPO", "CLOU", "CIBR", "SKYY",
    "WCLD", "VCIT", "VCSH", "VGIT", "VGSH", "VTEB", "MUB", "SCHZ", "SCHO", "SCHR", "VXUS",
    "IXUS", "FTIHX", "FXNAX", "VT", "ACWI", "URTH", "IOO",
];

/// The full universe, sorted and deduplicated.
pub fn default_universe() -> Vec<String> {
    let mut all: Vec<String> = KR_ETFS
        .iter()
        .chain(US_ETFS.iter())
        .map(|s| s.to_string())
        .collect();
    all.sort();
    all.dedup();
    all
}

/// Static theme/category for a ticker, where one is known.
pub fn theme_of(ticker: &str) -> Option<Theme> {
    let theme = match ticker {
        "QQQ" | "XLK" | "SOXX" | "BOTZ" | "ARKK" | "SMH" | "VGT" | "FINX" | "HACK" | "ROBO"
        | "ESPO" | "CLOU" | "CIBR" | "SKYY" | "WCLD" | "133690" | "232080" | "371460"
        | "379800" | "453950" | "309210" | "114800" | "122630" | "139660" => Theme::Technology,

        "XLE" | "USO" | "TAN" | "ICLN" | "PBW" | "VDE" | "XOP" | "217770" => Theme::Energy,

        "XLV" | "VHT" | "XBI" | "IHI" | "277630" | "305720" | "139670" => Theme::Healthcare,

        "XLF" | "VFH" | "KRE" | "KBE" | "091160" => Theme::Finance,

        "XLY" | "XLP" | "VDC" | "XRT" => Theme::Consumer,

        "XLI" | "VIS" | "XHB" | "ITB" => Theme::Industrials,

        "XLU" => Theme::Utilities,

        "XLC" => Theme::Communications,

        "XLB" | "XME" => Theme::Materials,

        "VNQ" | "SCHH" | "IYR" | "XLRE" => Theme::RealEstate,

        "SPY" | "DIA" | "IWM" | "VTI" | "VOO" | "VTV" | "VUG" | "VB" | "VBK" | "VBR" | "SCHD"
        | "069500" | "102110" | "114460" => Theme::BroadMarket,

        "AGG" | "TLT" | "BND" | "IEF" | "SHY" | "LQD" | "HYG" | "TIP" | "VCIT" | "VCSH"
        | "VGIT" | "VGSH" | "VTEB" | "MUB" | "SCHZ" | "SCHO" | "SCHR" | "EMB" => Theme::Bonds,

        "GLD" | "SLV" | "DBC" | "UNG" | "PPLT" => Theme::Commodities,

        "VEA" | "VWO" | "EFA" | "EEM" | "IEFA" | "VEU" | "VSS" | "VGK" | "VPL" | "VXUS"
        | "IXUS" | "VT" | "ACWI" | "URTH" | "IOO" | "EWY" | "EWZ" | "EWU" | "EWH" | "EWG"
        | "EWC" | "EWJ" | "EWT" => Theme::International,

        _ => return None,
    };
    Some(theme)
}

/// Display category, falling back to a shape heuristic for unmapped tickers.
pub fn category_of(ticker: &str) -> &'static str {
    if let Some(theme) = theme_of(ticker) {
        return theme.label();
    }
    let upper = ticker.to_uppercase();
    if upper.contains("200") {
        "Broad Market"
    } else if upper.contains("TECH") {
        "Technology"
    } else {
        "Others"
    }
}

/// Human-readable fund name where one is on file.
pub fn display_name(ticker: &str) -> String {
    let known = match ticker {
        "069500" => "KODEX 200",
        "102110" => "TIGER 200",
        "SPY" => "SPDR S&P 500 ETF",
        "QQQ" => "Invesco QQQ Trust",
        "VTI" => "Vanguard Total Stock Market ETF",
        "TLT" => "iShares 20+ Year Treasury Bond ETF",
        "GLD" => "SPDR Gold Shares",
        "SLV" => "iShares Silver Trust",
        _ => return format!("{ticker} ETF"),
    };
    known.to_string()
}
