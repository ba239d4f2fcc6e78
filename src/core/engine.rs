use super::assumptions::{Assumptions, validate_horizon};
use super::error::ModelResult;
use super::types::{AdsPhase, ChannelBreakdown, MarketingSpend, MonthRecord};

/// Cost per click assumed for the "other" marketing channel.
const OTHER_CHANNEL_CPC: f64 = 2.0;

/// Below this market headroom paid campaigns stop spending.
const ADS_SATURATION_CUTOFF: f64 = 0.05;

/// State carried from one month to the next. Everything else in a
/// [`MonthRecord`] is recomputed from this and the assumptions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthState {
    pub followers: f64,
    pub paying_users: f64,
    pub cumulative_cash: f64,
    pub cumulative_paid_ads_spend: f64,
    /// Paid-ads spend in the current year, reset every January.
    pub annual_paid_ads_spend: f64,
    pub free_users: f64,
    pub cumulative_signups: f64,
}

impl MonthState {
    pub fn initial(assumptions: &Assumptions) -> Self {
        Self {
            followers: assumptions.followers_initial,
            paying_users: 0.0,
            cumulative_cash: 0.0,
            cumulative_paid_ads_spend: 0.0,
            annual_paid_ads_spend: 0.0,
            free_users: 0.0,
            cumulative_signups: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PaidAdsOutcome {
    phase: AdsPhase,
    follower_spend: f64,
    click_spend: f64,
    impressions: f64,
    reach: f64,
    new_followers: f64,
    follower_visitors: f64,
    click_visitors: f64,
}

impl PaidAdsOutcome {
    fn paused() -> Self {
        Self {
            phase: AdsPhase::Paused,
            follower_spend: 0.0,
            click_spend: 0.0,
            impressions: 0.0,
            reach: 0.0,
            new_followers: 0.0,
            follower_visitors: 0.0,
            click_visitors: 0.0,
        }
    }

    fn spend(self) -> f64 {
        self.follower_spend + self.click_spend
    }

    fn visitors(self) -> f64 {
        self.follower_visitors + self.click_visitors
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SocialReach {
    impressions_followers: f64,
    impressions_non_followers: f64,
    unique_non_follower_reach: f64,
    organic_visitors: f64,
}

/// Runs the projection for `horizon_months` months.
///
/// Validation happens up front, so an error means no month was simulated.
pub fn simulate(assumptions: &Assumptions, horizon_months: u32) -> ModelResult<Vec<MonthRecord>> {
    assumptions.validate()?;
    validate_horizon(horizon_months)?;

    let mut state = MonthState::initial(assumptions);
    let mut months = Vec::with_capacity(horizon_months as usize);
    for month_index in 1..=horizon_months {
        let (next, record) = step_month(assumptions, state, month_index);
        months.push(record);
        state = next;
    }
    Ok(months)
}

/// Advances one month. `month_index` is 1-based across the horizon.
///
/// Assumes `assumptions` already passed [`Assumptions::validate`].
pub fn step_month(
    assumptions: &Assumptions,
    state: MonthState,
    month_index: u32,
) -> (MonthState, MonthRecord) {
    let (year, month) = year_and_month(month_index);
    let a = assumptions;

    // Followers.
    let followers_start = state.followers;
    let saturation = headroom(followers_start, a.market_max_followers);
    let effective_growth = a.follower_growth_rate * adoption_factor(a, month_index);
    let organic_new_followers = followers_start * effective_growth * saturation;

    let annual_spent = if month == 1 {
        0.0
    } else {
        state.annual_paid_ads_spend
    };
    let budget = paid_ads_budget(a, state.cumulative_paid_ads_spend, annual_spent);
    let ads = plan_paid_ads(a, followers_start, saturation, budget);

    let followers_end = (followers_start + organic_new_followers + ads.new_followers)
        .min(a.market_max_followers)
        .max(0.0);

    // Traffic.
    let reach = social_reach(a, followers_start, followers_end);
    let visitors = ChannelBreakdown {
        organic: reach.organic_visitors,
        influencer: a.influencer_collabs_for_year(year) * a.influencer_visitors_per_collab(),
        other: a.other_marketing_budget / OTHER_CHANNEL_CPC,
        paid_ads: ads.visitors(),
    };
    let total_visitors = visitors.total();

    // Funnel.
    let total_signups = total_visitors * a.conv_visitor_to_signup;
    let signups = apportion(visitors, total_signups);
    let new_payers = signups.scale(a.conv_signup_to_paying);
    let new_payers_from_signups = new_payers.total();

    let paying_users_start = state.paying_users;
    let referral_new_payers = referral_new_payers(a, total_signups, paying_users_start);

    let free_users_start = state.free_users;
    let free_active_users = free_users_start * a.free_active_share;
    let existing_free_new_payers = (free_active_users * a.existing_free_conversion_rate)
        .round()
        .max(0.0);
    let free_users_end = (free_users_start + (total_signups - new_payers_from_signups)
        - existing_free_new_payers)
        .max(0.0);

    // Paying base.
    let churn_rate = a.churn_for_year(year);
    let churned_users = paying_users_start * churn_rate;
    let new_paying_users = new_payers_from_signups + referral_new_payers + existing_free_new_payers;
    let paying_users_end = (paying_users_start - churned_users + new_paying_users)
        .max(0.0)
        .min(a.market_max_paying_users);

    // Money.
    let mrr = paying_users_end * a.arpu;
    let marketing_spend = MarketingSpend {
        organic: a.posts_per_month * a.organic_cost_per_post,
        influencer: new_payers.influencer * a.influencer_reward_per_sub,
        other: a.other_marketing_budget,
        referral: referral_new_payers * a.referral_reward_per_sub,
        paid_ads: ads.spend(),
    };
    let total_marketing_spend = marketing_spend.total();

    let data_subscription_cost =
        threshold_fee(a.data_subscription_fee, a.data_subscription_mrr_threshold, mrr);
    let api_cost = threshold_fee(a.api_fee, a.api_mrr_threshold, mrr);
    let direct_costs = data_subscription_cost + api_cost;
    let fixed_cost = fixed_cost_for_year(a, year);
    let total_costs = total_marketing_spend + direct_costs + fixed_cost;

    let gross_profit = mrr - direct_costs;
    let gross_margin = if mrr > 0.0 { gross_profit / mrr } else { 0.0 };
    let net_cash_flow = mrr - total_costs;
    let cumulative_cash = state.cumulative_cash + net_cash_flow;

    let cumulative_paid_ads_spend = state.cumulative_paid_ads_spend + ads.spend();
    let annual_paid_ads_spend = annual_spent + ads.spend();
    let cumulative_signups = state.cumulative_signups + total_signups;

    let next = MonthState {
        followers: followers_end,
        paying_users: paying_users_end,
        cumulative_cash,
        cumulative_paid_ads_spend,
        annual_paid_ads_spend,
        free_users: free_users_end,
        cumulative_signups,
    };

    let record = MonthRecord {
        year,
        month,
        month_index,
        followers_start,
        organic_new_followers,
        paid_new_followers: ads.new_followers,
        followers_end,
        saturation_factor: saturation,
        posts: a.posts_per_month,
        impressions_followers: reach.impressions_followers,
        impressions_non_followers: reach.impressions_non_followers,
        social_views: reach.impressions_followers + reach.impressions_non_followers,
        unique_non_follower_reach: reach.unique_non_follower_reach,
        ads_phase: ads.phase,
        follower_ads_spend: ads.follower_spend,
        click_ads_spend: ads.click_spend,
        follower_ads_impressions: ads.impressions,
        follower_ads_reach: ads.reach,
        follower_ads_visitors: ads.follower_visitors,
        click_ads_visitors: ads.click_visitors,
        annual_paid_ads_spend,
        cumulative_paid_ads_spend,
        visitors,
        total_visitors,
        signups,
        total_signups,
        new_payers,
        new_payers_from_signups,
        referral_new_payers,
        existing_free_new_payers,
        new_paying_users,
        churn_rate,
        paying_users_start,
        churned_users,
        paying_users_end,
        cumulative_signups,
        free_users_start,
        free_active_users,
        free_users_end,
        total_users_end: paying_users_end + free_users_end,
        arpu: a.arpu,
        mrr,
        marketing_spend,
        total_marketing_spend,
        data_subscription_cost,
        api_cost,
        direct_costs,
        fixed_cost,
        total_costs,
        gross_profit,
        gross_margin,
        net_cash_flow,
        cumulative_cash,
    };

    (next, record)
}

fn year_and_month(month_index: u32) -> (u32, u32) {
    let zero_based = month_index.saturating_sub(1);
    (zero_based / 12 + 1, zero_based % 12 + 1)
}

fn adoption_factor(assumptions: &Assumptions, month_index: u32) -> f64 {
    (month_index as f64 / assumptions.adoption_ramp_months).min(1.0)
}

/// Remaining market fraction, `1 - current / cap`, floored at zero.
fn headroom(current: f64, cap: f64) -> f64 {
    (1.0 - current / cap).max(0.0)
}

/// Monthly budget clipped to whatever the lifetime and annual caps leave.
fn paid_ads_budget(assumptions: &Assumptions, cumulative_spend: f64, annual_spend: f64) -> f64 {
    let mut budget = assumptions.paid_ads_monthly_budget;
    if assumptions.paid_ads_max_annual_budget > 0.0 {
        budget = budget.min((assumptions.paid_ads_max_annual_budget - annual_spend).max(0.0));
    }
    if assumptions.paid_ads_max_total_budget > 0.0 {
        budget = budget.min((assumptions.paid_ads_max_total_budget - cumulative_spend).max(0.0));
    }
    budget
}

fn plan_paid_ads(
    assumptions: &Assumptions,
    followers_start: f64,
    saturation: f64,
    budget: f64,
) -> PaidAdsOutcome {
    if saturation < ADS_SATURATION_CUTOFF || budget <= 0.0 {
        return PaidAdsOutcome::paused();
    }

    let threshold = assumptions.follower_threshold_for_click_ads;
    if threshold < 0.0 || followers_start < threshold {
        let impressions = budget / assumptions.follower_ads_cpm * 1_000.0;
        let reach = impressions / assumptions.frequency;
        PaidAdsOutcome {
            phase: AdsPhase::FollowerAds,
            follower_spend: budget,
            click_spend: 0.0,
            impressions,
            reach,
            new_followers: reach * assumptions.follower_ads_reach_to_follower,
            follower_visitors: reach * assumptions.follower_ads_ctr_to_site,
            click_visitors: 0.0,
        }
    } else {
        PaidAdsOutcome {
            phase: AdsPhase::ClickAds,
            click_spend: budget,
            click_visitors: budget / assumptions.click_ads_cpc,
            ..PaidAdsOutcome::paused()
        }
    }
}

fn social_reach(assumptions: &Assumptions, followers_start: f64, followers_end: f64) -> SocialReach {
    let avg_followers = (followers_start + followers_end) / 2.0;
    let impressions_followers = avg_followers
        * assumptions.posts_per_month
        * assumptions.reach_per_post
        * assumptions.frequency;
    let impressions_non_followers =
        impressions_followers * assumptions.non_follower_reach_multiplier;
    let unique_non_follower_reach = impressions_non_followers / assumptions.frequency;
    SocialReach {
        impressions_followers,
        impressions_non_followers,
        unique_non_follower_reach,
        organic_visitors: unique_non_follower_reach * assumptions.organic_ctr,
    }
}

/// Splits `total` across channels by their share of visitors.
fn apportion(visitors: ChannelBreakdown, total: f64) -> ChannelBreakdown {
    visitors.shares().scale(total)
}

/// New payers invited by this month's signups, throttled as the paying
/// market fills up.
fn referral_new_payers(assumptions: &Assumptions, signups: f64, paying_users_start: f64) -> f64 {
    let capacity = headroom(paying_users_start, assumptions.market_max_paying_users);
    signups * assumptions.referral_monthly_rate * capacity
}

/// A fee that applies once MRR reaches its threshold (inclusive).
fn threshold_fee(fee: f64, threshold: f64, mrr: f64) -> f64 {
    if mrr >= threshold { fee } else { 0.0 }
}

fn fixed_cost_for_year(assumptions: &Assumptions, year: u32) -> f64 {
    assumptions.base_fixed_cost
        * (1.0 + assumptions.fixed_cost_annual_growth).powi(year.saturating_sub(1) as i32)
}
