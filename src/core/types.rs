use serde::Serialize;

/// Per-channel quantities for the four traffic sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBreakdown {
    pub organic: f64,
    pub influencer: f64,
    pub other: f64,
    pub paid_ads: f64,
}

impl ChannelBreakdown {
    pub fn total(self) -> f64 {
        self.organic + self.influencer + self.other + self.paid_ads
    }

    pub fn scale(self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            organic: f(self.organic),
            influencer: f(self.influencer),
            other: f(self.other),
            paid_ads: f(self.paid_ads),
        }
    }

    /// Each channel's fraction of the total; all zero when the total is zero.
    pub fn shares(self) -> Self {
        let total = self.total();
        if total > 0.0 {
            self.map(|v| v / total)
        } else {
            Self::default()
        }
    }
}

impl std::ops::Add for ChannelBreakdown {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            organic: self.organic + rhs.organic,
            influencer: self.influencer + rhs.influencer,
            other: self.other + rhs.other,
            paid_ads: self.paid_ads + rhs.paid_ads,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingSpend {
    pub organic: f64,
    pub influencer: f64,
    pub other: f64,
    pub referral: f64,
    pub paid_ads: f64,
}

impl MarketingSpend {
    pub fn total(self) -> f64 {
        self.organic + self.influencer + self.other + self.referral + self.paid_ads
    }
}

impl std::ops::Add for MarketingSpend {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            organic: self.organic + rhs.organic,
            influencer: self.influencer + rhs.influencer,
            other: self.other + rhs.other,
            referral: self.referral + rhs.referral,
            paid_ads: self.paid_ads + rhs.paid_ads,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdsPhase {
    /// CPM campaigns buying reach and followers.
    FollowerAds,
    /// CPC campaigns buying site visits.
    ClickAds,
    /// No spend: budget exhausted, capped, or market saturated.
    Paused,
}

/// One simulated month. Stocks are end-of-month unless named `_start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub year: u32,
    pub month: u32,
    /// 1-based month across the whole horizon.
    pub month_index: u32,

    pub followers_start: f64,
    pub organic_new_followers: f64,
    pub paid_new_followers: f64,
    pub followers_end: f64,
    pub saturation_factor: f64,

    pub posts: f64,
    pub impressions_followers: f64,
    pub impressions_non_followers: f64,
    pub social_views: f64,
    pub unique_non_follower_reach: f64,

    pub ads_phase: AdsPhase,
    pub follower_ads_spend: f64,
    pub click_ads_spend: f64,
    pub follower_ads_impressions: f64,
    pub follower_ads_reach: f64,
    pub follower_ads_visitors: f64,
    pub click_ads_visitors: f64,
    pub annual_paid_ads_spend: f64,
    pub cumulative_paid_ads_spend: f64,

    pub visitors: ChannelBreakdown,
    pub total_visitors: f64,
    pub signups: ChannelBreakdown,
    pub total_signups: f64,
    /// Immediate conversions, apportioned by channel.
    pub new_payers: ChannelBreakdown,
    pub new_payers_from_signups: f64,
    pub referral_new_payers: f64,
    pub existing_free_new_payers: f64,
    pub new_paying_users: f64,

    pub churn_rate: f64,
    pub paying_users_start: f64,
    pub churned_users: f64,
    pub paying_users_end: f64,

    pub cumulative_signups: f64,
    pub free_users_start: f64,
    pub free_active_users: f64,
    pub free_users_end: f64,
    pub total_users_end: f64,

    pub arpu: f64,
    pub mrr: f64,
    pub marketing_spend: MarketingSpend,
    pub total_marketing_spend: f64,
    pub data_subscription_cost: f64,
    pub api_cost: f64,
    pub direct_costs: f64,
    pub fixed_cost: f64,
    pub total_costs: f64,
    pub gross_profit: f64,
    pub gross_margin: f64,
    pub net_cash_flow: f64,
    pub cumulative_cash: f64,
}

/// Running unit economics for one month of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUnitEconomics {
    pub month_index: u32,
    pub cumulative_marketing_spend: f64,
    pub cumulative_new_customers: f64,
    pub monthly_cac: Option<f64>,
    pub cumulative_cac: Option<f64>,
    pub monthly_ltv: f64,
    pub ltv_cac_ratio: Option<f64>,
}

/// KPIs for one simulated year. Ratios that would divide by zero are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub year: u32,
    pub months: u32,

    pub end_paying_users: f64,
    pub end_free_users: f64,
    pub end_mrr: f64,
    pub arr: f64,
    pub end_followers: f64,

    pub total_new_customers: f64,
    pub new_payers: ChannelBreakdown,
    pub new_payers_from_signups: f64,
    pub referral_new_payers: f64,
    pub existing_free_new_payers: f64,
    pub total_signups: f64,

    pub marketing_spend: MarketingSpend,
    pub total_marketing_spend: f64,
    pub average_cac: Option<f64>,

    pub revenue: f64,
    pub gross_profit: f64,
    pub gross_margin: f64,
    pub total_costs: f64,
    pub net_cash_flow: f64,
    pub cumulative_cash_end: f64,

    pub churn_rate: f64,
    pub ltv: Option<f64>,
    pub ltv_cac_ratio: Option<f64>,

    pub visitors: ChannelBreakdown,
    pub total_visitors: f64,
    pub visitor_share: ChannelBreakdown,
    pub total_social_views: f64,
}
