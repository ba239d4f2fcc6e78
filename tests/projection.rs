use std::collections::BTreeMap;

use growth_model::core::{
    AdsPhase, Assumptions, ModelError, aggregate, break_even_month, monthly_unit_economics,
    simulate,
};

const EPS: f64 = 1e-6;

fn assert_approx(actual: f64, expected: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= EPS * scale,
        "expected {expected}, got {actual}"
    );
}

fn profitable_assumptions() -> Assumptions {
    let values = BTreeMap::from([
        ("ARPU".to_string(), 30.0),
        ("ConvVS".to_string(), 0.05),
        ("ConvSP".to_string(), 0.18),
    ]);
    let (assumptions, ignored) = Assumptions::from_map(&values);
    assert!(ignored.is_empty());
    assumptions
}

#[test]
fn three_year_projection_rolls_up_into_years() {
    let assumptions = Assumptions::default();
    let months = simulate(&assumptions, 36).expect("default assumptions are valid");
    let years = aggregate(&months).expect("non-empty trace");

    assert_eq!(months.len(), 36);
    assert_eq!(years.len(), 3);
    for (i, year) in years.iter().enumerate() {
        let group = &months[i * 12..(i + 1) * 12];
        let last = &group[11];
        assert_eq!(year.year, i as u32 + 1);
        assert_eq!(year.months, 12);
        assert_approx(year.end_mrr, last.mrr);
        assert_approx(year.arr, last.mrr * 12.0);
        assert_approx(year.end_paying_users, last.paying_users_end);
        assert_approx(year.revenue, group.iter().map(|m| m.mrr).sum());
        assert_approx(
            year.total_new_customers,
            group.iter().map(|m| m.new_paying_users).sum(),
        );
        assert_approx(year.cumulative_cash_end, last.cumulative_cash);
    }
}

#[test]
fn cash_position_is_running_sum_of_flows() {
    let months = simulate(&profitable_assumptions(), 48).expect("valid assumptions");
    let mut cash = 0.0;
    for m in &months {
        cash += m.net_cash_flow;
        assert_approx(m.cumulative_cash, cash);
        assert_approx(m.net_cash_flow, m.mrr - m.total_costs);
    }
}

#[test]
fn market_caps_hold_over_long_horizons() {
    let assumptions = profitable_assumptions();
    let months = simulate(&assumptions, 120).expect("valid assumptions");
    for m in &months {
        assert!(m.paying_users_end <= assumptions.market_max_paying_users + EPS);
        assert!(m.followers_end <= assumptions.market_max_followers + EPS);
        assert!(m.paying_users_end >= 0.0);
    }
}

#[test]
fn profitable_business_breaks_even_once_cash_turns_positive() {
    let months = simulate(&profitable_assumptions(), 36).expect("valid assumptions");
    let month = break_even_month(&months).expect("cash should turn positive");
    let idx = month as usize - 1;

    assert!(month > 1);
    assert!(months[idx].cumulative_cash >= 0.0);
    assert!(months[idx - 1].cumulative_cash < 0.0);
    assert!(months[..idx].iter().all(|m| m.cumulative_cash < 0.0));
}

#[test]
fn unit_economics_track_every_month() {
    let months = simulate(&profitable_assumptions(), 24).expect("valid assumptions");
    let economics = monthly_unit_economics(&months);
    assert_eq!(economics.len(), 24);

    let last = economics[23];
    let spend: f64 = months.iter().map(|m| m.total_marketing_spend).sum();
    let customers: f64 = months.iter().map(|m| m.new_paying_users).sum();
    assert_eq!(last.month_index, 24);
    assert_approx(last.cumulative_marketing_spend, spend);
    assert_approx(last.cumulative_new_customers, customers);
    assert_approx(last.cumulative_cac.expect("customers acquired"), spend / customers);
}

#[test]
fn disabled_paid_ads_never_spend() {
    let values = BTreeMap::from([("PaidAds_Monthly_Budget".to_string(), 0.0)]);
    let (assumptions, _) = Assumptions::from_map(&values);
    let months = simulate(&assumptions, 24).expect("valid assumptions");
    for m in &months {
        assert_eq!(m.ads_phase, AdsPhase::Paused);
        assert_eq!(m.marketing_spend.paid_ads, 0.0);
        assert_eq!(m.paid_new_followers, 0.0);
    }
}

#[test]
fn invalid_inputs_are_rejected() {
    let values = BTreeMap::from([("Organic_CTR_to_Site".to_string(), -0.1)]);
    let (assumptions, _) = Assumptions::from_map(&values);
    let err = simulate(&assumptions, 12).unwrap_err();
    assert!(
        matches!(err, ModelError::InvalidAssumption { ref name, .. } if name == "Organic_CTR_to_Site")
    );

    assert!(simulate(&Assumptions::default(), 0).is_err());
    assert_eq!(aggregate(&[]), Err(ModelError::EmptyInput));
}
