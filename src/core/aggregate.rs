use std::collections::BTreeMap;

use super::error::{ModelError, ModelResult};
use super::types::{
    ChannelBreakdown, MarketingSpend, MonthRecord, MonthlyUnitEconomics, YearSummary,
};

/// Lifetime in months assumed when churn is zero.
const ZERO_CHURN_LIFETIME_MONTHS: f64 = 120.0;

/// Rolls a month trace up into one summary per year, in ascending year order.
///
/// Months are grouped by their `year` field, so a year's months need not be
/// contiguous. End-of-year stocks come from the month with the highest
/// month-within-year in each group.
pub fn aggregate(months: &[MonthRecord]) -> ModelResult<Vec<YearSummary>> {
    if months.is_empty() {
        return Err(ModelError::EmptyInput);
    }

    let mut by_year: BTreeMap<u32, Vec<&MonthRecord>> = BTreeMap::new();
    for month in months {
        by_year.entry(month.year).or_default().push(month);
    }

    Ok(by_year
        .into_iter()
        .map(|(year, group)| summarize_year(year, &group))
        .collect())
}

fn summarize_year(year: u32, group: &[&MonthRecord]) -> YearSummary {
    // Groups are never empty: each key was created by pushing a month.
    let last = group
        .iter()
        .copied()
        .fold(group[0], |best, m| if m.month >= best.month { m } else { best });

    let mut new_payers = ChannelBreakdown::default();
    let mut visitors = ChannelBreakdown::default();
    let mut marketing_spend = MarketingSpend::default();
    let mut total_new_customers = 0.0;
    let mut new_payers_from_signups = 0.0;
    let mut referral_new_payers = 0.0;
    let mut existing_free_new_payers = 0.0;
    let mut total_signups = 0.0;
    let mut revenue = 0.0;
    let mut gross_profit = 0.0;
    let mut total_costs = 0.0;
    let mut net_cash_flow = 0.0;
    let mut total_social_views = 0.0;

    for m in group {
        new_payers = new_payers + m.new_payers;
        visitors = visitors + m.visitors;
        marketing_spend = marketing_spend + m.marketing_spend;
        total_new_customers += m.new_paying_users;
        new_payers_from_signups += m.new_payers_from_signups;
        referral_new_payers += m.referral_new_payers;
        existing_free_new_payers += m.existing_free_new_payers;
        total_signups += m.total_signups;
        revenue += m.mrr;
        gross_profit += m.gross_profit;
        total_costs += m.total_costs;
        net_cash_flow += m.net_cash_flow;
        total_social_views += m.social_views;
    }

    let total_marketing_spend = marketing_spend.total();
    let average_cac = ratio(total_marketing_spend, total_new_customers);
    let gross_margin = ratio(gross_profit, revenue).unwrap_or(0.0);
    let churn_rate = last.churn_rate;
    let ltv = ratio(last.arpu * gross_margin, churn_rate);
    let ltv_cac_ratio = match (ltv, average_cac) {
        (Some(ltv), Some(cac)) => ratio(ltv, cac),
        _ => None,
    };

    YearSummary {
        year,
        months: group.len() as u32,
        end_paying_users: last.paying_users_end,
        end_free_users: last.free_users_end,
        end_mrr: last.mrr,
        arr: last.mrr * 12.0,
        end_followers: last.followers_end,
        total_new_customers,
        new_payers,
        new_payers_from_signups,
        referral_new_payers,
        existing_free_new_payers,
        total_signups,
        marketing_spend,
        total_marketing_spend,
        average_cac,
        revenue,
        gross_profit,
        gross_margin,
        total_costs,
        net_cash_flow,
        cumulative_cash_end: last.cumulative_cash,
        churn_rate,
        ltv,
        ltv_cac_ratio,
        visitors,
        total_visitors: visitors.total(),
        visitor_share: visitors.shares(),
        total_social_views,
    }
}

/// `numerator / denominator`, or `None` when the denominator is not positive.
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then_some(numerator / denominator)
}

/// First month (1-based `month_index`) in which cumulative cash turns
/// non-negative after being negative. A trace that starts non-negative breaks
/// even in its first month.
pub fn break_even_month(months: &[MonthRecord]) -> Option<u32> {
    let mut previous_negative = true;
    for m in months {
        if m.cumulative_cash >= 0.0 && previous_negative {
            return Some(m.month_index);
        }
        previous_negative = m.cumulative_cash < 0.0;
    }
    None
}

/// Running CAC and LTV for every month of a trace.
pub fn monthly_unit_economics(months: &[MonthRecord]) -> Vec<MonthlyUnitEconomics> {
    let mut cumulative_marketing_spend = 0.0;
    let mut cumulative_new_customers = 0.0;

    months
        .iter()
        .map(|m| {
            cumulative_marketing_spend += m.total_marketing_spend;
            cumulative_new_customers += m.new_paying_users;

            let cumulative_cac = ratio(cumulative_marketing_spend, cumulative_new_customers);
            let monthly_ltv = if m.churn_rate > 0.0 {
                m.arpu * m.gross_margin / m.churn_rate
            } else {
                m.arpu * m.gross_margin * ZERO_CHURN_LIFETIME_MONTHS
            };

            MonthlyUnitEconomics {
                month_index: m.month_index,
                cumulative_marketing_spend,
                cumulative_new_customers,
                monthly_cac: ratio(m.total_marketing_spend, m.new_paying_users),
                cumulative_cac,
                monthly_ltv,
                ltv_cac_ratio: cumulative_cac.and_then(|cac| ratio(monthly_ltv, cac)),
            }
        })
        .collect()
}
