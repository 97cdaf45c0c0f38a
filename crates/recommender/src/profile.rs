use advisor_core::{Theme, UserProfile};

/// Portfolio weight split across the two markets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketWeights {
    pub domestic: f64,
    pub foreign: f64,
}

/// Quantitative targets derived from the questionnaire.
#[derive(Debug, Clone, Copy)]
pub struct QuantTargets {
    /// 1..=5, higher means more risk appetite.
    pub risk_score: f64,
    /// Annual return target as a fraction.
    pub expected_return: f64,
    pub market_weights: MarketWeights,
    pub theme_code: u8,
}

/// Maps the seven answers onto the quantitative targets used by the matcher
/// and scorer.
pub fn translate(profile: &UserProfile) -> QuantTargets {
    let risk_score =
        (profile.risk_tolerance as f64 + (6.0 - profile.loss_aversion as f64)) / 2.0;

    let expected_return = match profile.goal {
        1 => 0.02,
        2 => 0.05,
        3 => 0.08,
        4 => 0.12,
        5 => 0.15,
        _ => 0.08,
    };

    let market_weights = match profile.market_preference {
        1 => MarketWeights {
            domestic: 1.0,
            foreign: 0.0,
        },
        2 => MarketWeights {
            domestic: 0.0,
            foreign: 1.0,
        },
        _ => MarketWeights {
            domestic: 0.5,
            foreign: 0.5,
        },
    };

    QuantTargets {
        risk_score,
        expected_return,
        market_weights,
        theme_code: profile.theme_preference,
    }
}

/// Theme the user asked for; code 1 means "no preference".
pub fn preferred_theme(theme_code: u8) -> Option<Theme> {
    match theme_code {
        2 => Some(Theme::Technology),
        3 => Some(Theme::Energy),
        4 => Some(Theme::Healthcare),
        _ => None,
    }
}
