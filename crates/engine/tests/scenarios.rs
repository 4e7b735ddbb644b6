use engine::{
    build_strategy, run_grid, BacktestConfig, BacktestEngine, EngineError, ParameterGrid,
    PriceBar, PriceSeries, StrategyFamily, StrategyParameters, TradeAction,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn make_series(prices: &[f64]) -> PriceSeries {
    let bars = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let price = Decimal::from_str_exact(&format!("{:.2}", p)).unwrap();
            PriceBar {
                timestamp: (i as i64) * 60000,
                open: price,
                high: price + dec!(1),
                low: price - dec!(1),
                close: price,
                volume: dec!(100),
            }
        })
        .collect();
    PriceSeries::new(bars).unwrap()
}

fn ma_params(short: f64, long: f64) -> StrategyParameters {
    StrategyParameters::new()
        .with("short_period", short)
        .with("long_period", long)
}

#[test]
fn flat_series_never_trades() {
    let series = make_series(&[100.0; 100]);
    let strategy = build_strategy(StrategyFamily::MaCrossover, &ma_params(2.0, 4.0)).unwrap();

    let result =
        BacktestEngine::run(strategy.as_ref(), &series, &BacktestConfig::default()).unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.total_return_pct, Decimal::ZERO);
    assert_eq!(result.final_portfolio_value, dec!(10000));
    assert_eq!(result.max_drawdown_pct, Decimal::ZERO);
    assert_eq!(result.equity_curve.len(), 100);
}

#[test]
fn overbought_sell_while_flat_records_nothing() {
    // 100, 101, ..., 200: RSI is pinned at 100, so every signal is a sell
    let prices: Vec<f64> = (0..=100).map(|i| 100.0 + i as f64).collect();
    let series = make_series(&prices);
    let params = StrategyParameters::new()
        .with("period", 14.0)
        .with("oversold", 30.0)
        .with("overbought", 70.0);
    let strategy = build_strategy(StrategyFamily::RsiThreshold, &params).unwrap();

    let result =
        BacktestEngine::run(strategy.as_ref(), &series, &BacktestConfig::default()).unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.total_return_pct, Decimal::ZERO);
    assert_eq!(result.win_rate_pct, Decimal::ZERO);
}

#[test]
fn crossover_trades_exactly_at_the_cross() {
    let mut prices = vec![100.0; 10];
    prices.extend(vec![120.0; 10]);
    prices.extend(vec![80.0; 10]);
    let series = make_series(&prices);
    let strategy = build_strategy(StrategyFamily::MaCrossover, &ma_params(2.0, 4.0)).unwrap();

    let result =
        BacktestEngine::run(strategy.as_ref(), &series, &BacktestConfig::default()).unwrap();

    assert_eq!(result.trades.len(), 2);

    let buy = &result.trades[0];
    assert_eq!(buy.action, TradeAction::Buy);
    assert_eq!(buy.timestamp, 11 * 60000);
    assert_eq!(buy.price, dec!(120));

    let sell = &result.trades[1];
    assert_eq!(sell.action, TradeAction::Sell);
    assert_eq!(sell.timestamp, 21 * 60000);
    assert_eq!(sell.price, dec!(80));
    assert!(sell.profit_loss.unwrap() < Decimal::ZERO);

    assert_eq!(result.win_rate_pct, Decimal::ZERO);
    assert!(result.total_return_pct < Decimal::ZERO);
    assert!(result.max_drawdown_pct < Decimal::ZERO);
}

#[test]
fn grid_runs_every_valid_combination() {
    let prices: Vec<f64> = (0..200)
        .map(|i| 100.0 + 15.0 * ((i as f64) * 0.1).sin())
        .collect();
    let series = make_series(&prices);
    let grid = ParameterGrid::new()
        .axis("short_period", vec![5.0, 10.0])
        .axis("long_period", vec![20.0, 30.0]);

    let report = run_grid(
        StrategyFamily::MaCrossover,
        grid,
        &series,
        &BacktestConfig::default(),
    )
    .unwrap();

    assert_eq!(report.total_combinations, 4);
    assert_eq!(report.evaluated, 4);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.results.len(), 4);
}

#[test]
fn identical_inputs_give_identical_results() {
    let prices: Vec<f64> = (0..300)
        .map(|i| 50.0 + 10.0 * ((i as f64) * 0.07).sin() + 5.0 * ((i as f64) * 0.31).cos())
        .collect();
    let series = make_series(&prices);

    for family in StrategyFamily::all() {
        let params = StrategyParameters::new();
        let first = build_strategy(*family, &params).unwrap();
        let second = build_strategy(*family, &params).unwrap();

        let a = BacktestEngine::run(first.as_ref(), &series, &BacktestConfig::default()).unwrap();
        let b =
            BacktestEngine::run(second.as_ref(), &series, &BacktestConfig::default()).unwrap();
        assert_eq!(a, b, "{} was not deterministic", family);
    }
}

#[test]
fn results_serialize_to_json() {
    let mut prices = vec![100.0; 10];
    prices.extend(vec![120.0; 10]);
    let series = make_series(&prices);
    let strategy = build_strategy(StrategyFamily::MaCrossover, &ma_params(2.0, 4.0)).unwrap();
    let result =
        BacktestEngine::run(strategy.as_ref(), &series, &BacktestConfig::default()).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["strategy_name"], "SMA Crossover");
    assert_eq!(json["parameters"]["short_period"], 2.0);
    assert_eq!(json["trades"][0]["action"], "buy");
}

#[test]
fn extreme_prices_report_overflow_instead_of_panicking() {
    let closes = ["0.01", "0.001", "0.0000000000000000000000001", "0.00000000000000000000000001"];
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let close = Decimal::from_str_exact(raw).unwrap();
            PriceBar {
                timestamp: (i as i64) * 60000,
                open: close,
                high: close,
                low: close,
                close,
                volume: dec!(1),
            }
        })
        .collect();
    let series = PriceSeries::new(bars).unwrap();
    let params = StrategyParameters::new()
        .with("period", 1.0)
        .with("oversold", 30.0)
        .with("overbought", 70.0);
    let strategy = build_strategy(StrategyFamily::RsiThreshold, &params).unwrap();

    // RSI falls to 0 at bar 2 and the buy at 1e-25 cannot be sized
    let result = BacktestEngine::run(strategy.as_ref(), &series, &BacktestConfig::default());
    assert_eq!(result.unwrap_err(), EngineError::Overflow { index: 2 });
}
