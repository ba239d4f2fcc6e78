use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{ModelError, ModelResult};

/// Upper bound on the simulated horizon (one hundred years).
pub const MAX_HORIZON_MONTHS: u32 = 1_200;

/// Keys the loader accepts but no longer reads: both are derived quantities.
const DEPRECATED_KEYS: [&str; 2] = ["GrossMargin", "Inf_Visitors_per_Collab"];

/// Business assumptions driving the monthly simulation.
///
/// Rates are fractions in `[0, 1]`, money is in EUR per month unless the field
/// says otherwise. Build one with [`Assumptions::default`] or from a name-keyed
/// mapping with [`Assumptions::from_map`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub arpu: f64,
    pub conv_visitor_to_signup: f64,
    pub conv_signup_to_paying: f64,
    pub churn_y1: f64,
    pub churn_y2: f64,
    pub churn_y3: f64,

    pub followers_initial: f64,
    pub follower_growth_rate: f64,
    pub posts_per_month: f64,
    pub reach_per_post: f64,
    pub non_follower_reach_multiplier: f64,
    pub frequency: f64,
    pub organic_ctr: f64,
    pub adoption_ramp_months: f64,
    pub market_max_followers: f64,
    pub market_max_paying_users: f64,

    pub influencer_avg_followers: f64,
    pub influencer_reach_rate: f64,
    pub influencer_click_rate: f64,
    pub influencer_collabs_y1: f64,
    pub influencer_collabs_y2: f64,
    pub influencer_collabs_y3: f64,
    pub influencer_reward_per_sub: f64,

    pub referral_monthly_rate: f64,
    pub referral_reward_per_sub: f64,

    pub existing_free_conversion_rate: f64,
    pub free_active_share: f64,

    pub organic_cost_per_post: f64,
    pub other_marketing_budget: f64,

    pub base_fixed_cost: f64,
    pub fixed_cost_annual_growth: f64,
    pub data_subscription_fee: f64,
    pub data_subscription_mrr_threshold: f64,
    pub api_fee: f64,
    pub api_mrr_threshold: f64,

    pub paid_ads_monthly_budget: f64,
    /// Lifetime paid-ads cap; `0` disables it.
    pub paid_ads_max_total_budget: f64,
    /// Per-year paid-ads cap; `0` disables it.
    pub paid_ads_max_annual_budget: f64,
    pub follower_ads_cpm: f64,
    pub follower_ads_reach_to_follower: f64,
    pub follower_ads_ctr_to_site: f64,
    pub click_ads_cpc: f64,
    /// Follower count at which paid ads switch from follower to click
    /// campaigns. Negative keeps follower campaigns forever.
    pub follower_threshold_for_click_ads: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            arpu: 20.0,
            conv_visitor_to_signup: 0.13,
            conv_signup_to_paying: 0.035,
            churn_y1: 0.06,
            churn_y2: 0.06,
            churn_y3: 0.06,

            followers_initial: 1_000.0,
            follower_growth_rate: 0.08,
            posts_per_month: 120.0,
            reach_per_post: 0.04,
            non_follower_reach_multiplier: 0.5,
            frequency: 1.5,
            organic_ctr: 0.015,
            adoption_ramp_months: 24.0,
            market_max_followers: 50_000.0,
            market_max_paying_users: 2_000.0,

            influencer_avg_followers: 50_000.0,
            influencer_reach_rate: 0.3,
            influencer_click_rate: 0.02,
            influencer_collabs_y1: 1.0,
            influencer_collabs_y2: 1.0,
            influencer_collabs_y3: 1.0,
            influencer_reward_per_sub: 10.0,

            referral_monthly_rate: 0.02,
            referral_reward_per_sub: 10.0,

            existing_free_conversion_rate: 0.0,
            free_active_share: 0.5,

            organic_cost_per_post: 1.0,
            other_marketing_budget: 200.0,

            base_fixed_cost: 1_000.0,
            fixed_cost_annual_growth: 0.0,
            data_subscription_fee: 2_000.0,
            data_subscription_mrr_threshold: 5_000.0,
            api_fee: 5_000.0,
            api_mrr_threshold: 15_000.0,

            paid_ads_monthly_budget: 500.0,
            paid_ads_max_total_budget: 0.0,
            paid_ads_max_annual_budget: 0.0,
            follower_ads_cpm: 7.0,
            follower_ads_reach_to_follower: 0.1,
            follower_ads_ctr_to_site: 0.01,
            click_ads_cpc: 2.0,
            follower_threshold_for_click_ads: 20_000.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Bound {
    /// Fraction in `[0, 1]`.
    Rate,
    NonNegative,
    /// Used as a divisor.
    Positive,
    Finite,
}

struct Param {
    key: &'static str,
    aliases: &'static [&'static str],
    bound: Bound,
    get: fn(&Assumptions) -> f64,
    set: fn(&mut Assumptions, f64),
}

macro_rules! param {
    ($key:literal, [$($alias:literal),*], $bound:ident, $field:ident) => {
        Param {
            key: $key,
            aliases: &[$($alias),*],
            bound: Bound::$bound,
            get: |a| a.$field,
            set: |a, v| a.$field = v,
        }
    };
}

const PARAMS: &[Param] = &[
    param!("ARPU", [], NonNegative, arpu),
    param!("ConvVS", [], Rate, conv_visitor_to_signup),
    param!("ConvSP", [], Rate, conv_signup_to_paying),
    param!("ChurnY1", ["Churn_Rate"], Rate, churn_y1),
    param!("ChurnY2", [], Rate, churn_y2),
    param!("ChurnY3", [], Rate, churn_y3),
    param!("Followers_0", [], NonNegative, followers_initial),
    param!("Follower_Monthly_Growth", [], Rate, follower_growth_rate),
    param!("Posts_per_Month", ["Posts_per_Month_Y1"], NonNegative, posts_per_month),
    param!("Reach_per_Post", [], Rate, reach_per_post),
    param!("NonFollower_Reach_Multiplier", [], NonNegative, non_follower_reach_multiplier),
    param!("Frequency_Impressions_per_User", [], Positive, frequency),
    param!("Organic_CTR_to_Site", [], Rate, organic_ctr),
    param!("Follower_Adoption_Ramp_Months", [], Positive, adoption_ramp_months),
    param!("Market_Max_Followers_Local", ["Market_Max_Followers"], Positive, market_max_followers),
    param!(
        "Market_Max_PayingUsers_Local",
        ["Market_Max_PayingUsers"],
        Positive,
        market_max_paying_users
    ),
    param!("Inf_Avg_Followers", [], NonNegative, influencer_avg_followers),
    param!("Inf_Reach_Rate", [], Rate, influencer_reach_rate),
    param!("Inf_Click_Rate", [], Rate, influencer_click_rate),
    param!("Inf_Collabs_Y1", [], NonNegative, influencer_collabs_y1),
    param!("Inf_Collabs_Y2", [], NonNegative, influencer_collabs_y2),
    param!("Inf_Collabs_Y3", [], NonNegative, influencer_collabs_y3),
    param!("Influencer_Reward_per_Sub", [], NonNegative, influencer_reward_per_sub),
    param!("Referral_Monthly_Rate", [], Rate, referral_monthly_rate),
    param!("Referral_Reward_per_Sub", [], NonNegative, referral_reward_per_sub),
    param!(
        "Existing_Free_to_Paid_Monthly_Conv_Rate",
        [],
        Rate,
        existing_free_conversion_rate
    ),
    param!("Free_Active_Share", [], Rate, free_active_share),
    param!("Org_Cost_per_Post", [], NonNegative, organic_cost_per_post),
    param!("Other_Marketing_Budget", ["Other_Marketing_Budget_Y1"], NonNegative, other_marketing_budget),
    param!("BaseFixedCost", [], NonNegative, base_fixed_cost),
    param!("FixedCost_Annual_Growth", [], NonNegative, fixed_cost_annual_growth),
    param!("DataSub_Fee", [], NonNegative, data_subscription_fee),
    param!("DataSub_MRR_Threshold", [], NonNegative, data_subscription_mrr_threshold),
    param!("XAPI_Fee", [], NonNegative, api_fee),
    param!("XAPI_MRR_Threshold", [], NonNegative, api_mrr_threshold),
    param!("PaidAds_Monthly_Budget", [], NonNegative, paid_ads_monthly_budget),
    param!("PaidAds_Max_Total_Budget", [], NonNegative, paid_ads_max_total_budget),
    param!("PaidAds_Max_Annual_Budget", [], NonNegative, paid_ads_max_annual_budget),
    param!("FollowerAds_CPM_EUR", [], Positive, follower_ads_cpm),
    param!("FollowerAds_Reach_to_Follower_Rate", [], Rate, follower_ads_reach_to_follower),
    param!("FollowerAds_CTR_to_Site", [], Rate, follower_ads_ctr_to_site),
    param!("ClickAds_CPC_EUR", [], Positive, click_ads_cpc),
    param!("Follower_Threshold_For_Click_Ads", [], Finite, follower_threshold_for_click_ads),
];

/// Later-year keys that inherit a supplied year-1 value when absent.
const YEAR_FALLBACKS: [(&str, &str); 4] = [
    ("ChurnY2", "ChurnY1"),
    ("ChurnY3", "ChurnY1"),
    ("Inf_Collabs_Y2", "Inf_Collabs_Y1"),
    ("Inf_Collabs_Y3", "Inf_Collabs_Y1"),
];

fn find_param(key: &str) -> Option<&'static Param> {
    PARAMS
        .iter()
        .find(|p| p.key == key || p.aliases.contains(&key))
}

impl Assumptions {
    /// Builds assumptions from a name-keyed mapping, starting from the
    /// defaults. A canonical key wins over its aliases. Returns the keys that
    /// were not applied (unknown or deprecated) alongside the result.
    pub fn from_map(values: &BTreeMap<String, f64>) -> (Self, Vec<String>) {
        let mut assumptions = Self::default();
        let mut ignored = Vec::new();

        for (key, value) in values {
            if find_param(key).is_none() {
                ignored.push(key.clone());
            }
        }

        for param in PARAMS {
            let supplied = values.get(param.key).or_else(|| {
                param
                    .aliases
                    .iter()
                    .find_map(|alias| values.get(*alias))
            });
            if let Some(value) = supplied {
                (param.set)(&mut assumptions, *value);
            }
        }

        for (later, first) in YEAR_FALLBACKS {
            if Self::supplies(values, first) && !Self::supplies(values, later) {
                if let (Some(target), Some(source)) = (find_param(later), find_param(first)) {
                    let inherited = (source.get)(&assumptions);
                    (target.set)(&mut assumptions, inherited);
                }
            }
        }

        (assumptions, ignored)
    }

    /// Canonical key/value view, the inverse of [`Assumptions::from_map`].
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        PARAMS
            .iter()
            .map(|p| (p.key.to_string(), (p.get)(self)))
            .collect()
    }

    pub fn is_deprecated_key(key: &str) -> bool {
        DEPRECATED_KEYS.contains(&key)
    }

    /// Checks every parameter against its bound. Fails on the first
    /// offending parameter, reported under its canonical key.
    pub fn validate(&self) -> ModelResult<()> {
        for param in PARAMS {
            let value = (param.get)(self);
            if !value.is_finite() {
                return Err(ModelError::invalid(param.key, format!("{value} is not finite")));
            }
            match param.bound {
                Bound::Rate if !(0.0..=1.0).contains(&value) => {
                    return Err(ModelError::invalid(
                        param.key,
                        format!("rate {value} must be between 0 and 1"),
                    ));
                }
                Bound::NonNegative if value < 0.0 => {
                    return Err(ModelError::invalid(
                        param.key,
                        format!("{value} must be >= 0"),
                    ));
                }
                Bound::Positive if value <= 0.0 => {
                    return Err(ModelError::invalid(
                        param.key,
                        format!("{value} must be > 0"),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Churn rate for a 1-based year. Years past the third wrap around
    /// (year 4 uses the year-1 rate), which is intentional for long horizons.
    pub fn churn_for_year(&self, year: u32) -> f64 {
        cyclic_year_value([self.churn_y1, self.churn_y2, self.churn_y3], year)
    }

    /// Influencer collaborations per month for a 1-based year, wrapping like
    /// [`Assumptions::churn_for_year`].
    pub fn influencer_collabs_for_year(&self, year: u32) -> f64 {
        cyclic_year_value(
            [
                self.influencer_collabs_y1,
                self.influencer_collabs_y2,
                self.influencer_collabs_y3,
            ],
            year,
        )
    }

    pub fn influencer_visitors_per_collab(&self) -> f64 {
        self.influencer_avg_followers * self.influencer_reach_rate * self.influencer_click_rate
    }

    fn supplies(values: &BTreeMap<String, f64>, key: &str) -> bool {
        find_param(key).is_some_and(|p| {
            values.contains_key(p.key) || p.aliases.iter().any(|a| values.contains_key(*a))
        })
    }
}

fn cyclic_year_value(table: [f64; 3], year: u32) -> f64 {
    table[(year.max(1) as usize - 1) % table.len()]
}

pub fn validate_horizon(horizon_months: u32) -> ModelResult<()> {
    if horizon_months == 0 {
        return Err(ModelError::invalid("horizon_months", "must be > 0"));
    }
    if horizon_months > MAX_HORIZON_MONTHS {
        return Err(ModelError::invalid(
            "horizon_months",
            format!("{horizon_months} exceeds the limit of {MAX_HORIZON_MONTHS}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn defaults_are_valid() {
        Assumptions::default().validate().expect("defaults should validate");
    }

    #[test]
    fn empty_map_yields_defaults() {
        let (assumptions, ignored) = Assumptions::from_map(&BTreeMap::new());
        assert_eq!(assumptions, Assumptions::default());
        assert!(ignored.is_empty());
    }

    #[test]
    fn default_map_round_trips() {
        let defaults = Assumptions::default();
        let (loaded, ignored) = Assumptions::from_map(&defaults.to_map());
        assert_eq!(loaded, defaults);
        assert!(ignored.is_empty());
    }

    #[test]
    fn every_field_has_a_canonical_key() {
        assert_eq!(Assumptions::default().to_map().len(), PARAMS.len());
        for (i, a) in PARAMS.iter().enumerate() {
            for b in &PARAMS[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
    }

    #[test]
    fn later_years_inherit_year_one_when_absent() {
        let (assumptions, _) = Assumptions::from_map(&map(&[
            ("ChurnY1", 0.04),
            ("ChurnY3", 0.02),
            ("Inf_Collabs_Y1", 3.0),
        ]));
        assert_eq!(assumptions.churn_y1, 0.04);
        assert_eq!(assumptions.churn_y2, 0.04);
        assert_eq!(assumptions.churn_y3, 0.02);
        assert_eq!(assumptions.influencer_collabs_y2, 3.0);
        assert_eq!(assumptions.influencer_collabs_y3, 3.0);
    }

    #[test]
    fn aliases_apply_and_canonical_key_wins() {
        let (assumptions, ignored) = Assumptions::from_map(&map(&[
            ("Churn_Rate", 0.05),
            ("Posts_per_Month_Y1", 60.0),
            ("Other_Marketing_Budget_Y1", 100.0),
            ("Other_Marketing_Budget", 300.0),
        ]));
        assert_eq!(assumptions.churn_y1, 0.05);
        assert_eq!(assumptions.churn_y2, 0.05);
        assert_eq!(assumptions.posts_per_month, 60.0);
        assert_eq!(assumptions.other_marketing_budget, 300.0);
        assert!(ignored.is_empty());
    }

    #[test]
    fn unknown_and_deprecated_keys_are_reported() {
        let (assumptions, ignored) = Assumptions::from_map(&map(&[
            ("GrossMargin", 0.8),
            ("Mystery", 1.0),
            ("ARPU", 30.0),
        ]));
        assert_eq!(assumptions.arpu, 30.0);
        assert_eq!(ignored, vec!["GrossMargin".to_string(), "Mystery".to_string()]);
        assert!(Assumptions::is_deprecated_key("GrossMargin"));
        assert!(!Assumptions::is_deprecated_key("Mystery"));
    }

    #[test]
    fn validate_rejects_rate_outside_unit_interval() {
        let mut assumptions = Assumptions::default();
        assumptions.conv_visitor_to_signup = 1.2;
        let err = assumptions.validate().unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidAssumption {
                name: "ConvVS".to_string(),
                reason: "rate 1.2 must be between 0 and 1".to_string(),
            }
        );

        let mut assumptions = Assumptions::default();
        assumptions.churn_y2 = -0.01;
        assert!(matches!(
            assumptions.validate(),
            Err(ModelError::InvalidAssumption { ref name, .. }) if name == "ChurnY2"
        ));
    }

    #[test]
    fn validate_rejects_negative_money_and_zero_divisors() {
        let mut assumptions = Assumptions::default();
        assumptions.base_fixed_cost = -1.0;
        assert!(assumptions.validate().is_err());

        let mut assumptions = Assumptions::default();
        assumptions.follower_ads_cpm = 0.0;
        assert!(matches!(
            assumptions.validate(),
            Err(ModelError::InvalidAssumption { ref name, .. }) if name == "FollowerAds_CPM_EUR"
        ));

        let mut assumptions = Assumptions::default();
        assumptions.market_max_paying_users = 0.0;
        assert!(assumptions.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_values() {
        let mut assumptions = Assumptions::default();
        assumptions.arpu = f64::NAN;
        assert!(assumptions.validate().is_err());

        let mut assumptions = Assumptions::default();
        assumptions.follower_threshold_for_click_ads = f64::INFINITY;
        assert!(assumptions.validate().is_err());
    }

    #[test]
    fn negative_click_threshold_is_a_valid_sentinel() {
        let mut assumptions = Assumptions::default();
        assumptions.follower_threshold_for_click_ads = -1.0;
        assumptions.validate().expect("sentinel threshold should validate");
    }

    #[test]
    fn churn_and_collabs_cycle_every_three_years() {
        let mut assumptions = Assumptions::default();
        assumptions.churn_y1 = 0.06;
        assumptions.churn_y2 = 0.05;
        assumptions.churn_y3 = 0.04;
        assumptions.influencer_collabs_y1 = 1.0;
        assumptions.influencer_collabs_y2 = 2.0;
        assumptions.influencer_collabs_y3 = 4.0;

        let churn = (1..=7).map(|y| assumptions.churn_for_year(y)).collect::<Vec<_>>();
        assert_eq!(churn, vec![0.06, 0.05, 0.04, 0.06, 0.05, 0.04, 0.06]);
        assert_eq!(assumptions.influencer_collabs_for_year(5), 2.0);
        assert_eq!(assumptions.influencer_collabs_for_year(6), 4.0);
    }

    #[test]
    fn visitors_per_collab_is_derived() {
        let assumptions = Assumptions::default();
        assert!((assumptions.influencer_visitors_per_collab() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn horizon_bounds() {
        assert!(validate_horizon(0).is_err());
        assert!(validate_horizon(1).is_ok());
        assert!(validate_horizon(MAX_HORIZON_MONTHS).is_ok());
        assert!(validate_horizon(MAX_HORIZON_MONTHS + 1).is_err());
    }
}
