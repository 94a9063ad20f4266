//! 短期价格预测
//!
//! 对最近的成交价做最小二乘多项式拟合，外推下一时刻的价格。
//! 自变量先映射到 [-1, 1] 再拟合，高阶时数值更稳定。

use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2};

use super::binance::BinanceClient;

/// 拟合得到的多项式，自变量已做线性映射
#[derive(Debug, Clone)]
pub struct Polynomial {
    coefficients: Array1<f64>,
    offset: f64,
    scale: f64,
}

impl Polynomial {
    /// 对 x = 0..n-1 上的样本拟合 degree 阶多项式
    pub fn fit(ys: &[f64], degree: usize) -> Option<Self> {
        let n = ys.len();
        if n < degree + 1 || n < 2 {
            return None;
        }

        // [0, n-1] -> [-1, 1]
        let scale = 2.0 / (n - 1) as f64;
        let offset = -1.0;

        let mut vander = Array2::<f64>::zeros((n, degree + 1));
        for i in 0..n {
            let x = offset + scale * i as f64;
            for d in 0..=degree {
                vander[[i, d]] = x.powi(d as i32);
            }
        }
        let y = Array1::from_vec(ys.to_vec());

        let xtx = vander.t().dot(&vander);
        let xty = vander.t().dot(&y);
        let coefficients = solve(xtx, xty)?;

        Some(Self {
            coefficients,
            offset,
            scale,
        })
    }

    /// 在原始自变量 x 处求值
    pub fn eval(&self, x: f64) -> f64 {
        let t = self.offset + self.scale * x;
        // Horner
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * t + c)
    }
}

/// 高斯消元（部分主元）求解 A x = b
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| {
            a[[i, col]]
                .abs()
                .partial_cmp(&a[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                a.swap([col, j], [pivot_row, j]);
            }
            b.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|j| a[[row, j]] * x[j]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

/// 基于最近成交价的价格预测器
#[derive(Debug, Clone, Copy)]
pub struct PricePredictor {
    pub trade_limit: usize,
    pub degree: usize,
}

impl PricePredictor {
    pub fn new(trade_limit: usize, degree: usize) -> Self {
        Self { trade_limit, degree }
    }

    /// 由按时间排序（最早在前）的成交价外推下一笔价格
    ///
    /// 样本不足或外推结果不合理时退回到最新成交价
    pub fn forecast(&self, prices: &[f64]) -> Option<f64> {
        let last = *prices.last()?;
        let predicted = Polynomial::fit(prices, self.degree)
            .map(|poly| poly.eval((prices.len() + 1) as f64));

        match predicted {
            Some(value) if value.is_finite() && value > 0.0 => Some(value),
            _ => Some(last),
        }
    }

    /// 获取交易对的预测价格
    pub async fn predict(&self, client: &BinanceClient, market_symbol: &str) -> Result<f64> {
        let trades = client
            .get_aggregate_trades(market_symbol, self.trade_limit)
            .await?;
        let prices: Vec<f64> = trades.iter().map(|t| t.price).collect();

        let predicted = self
            .forecast(&prices)
            .ok_or_else(|| anyhow!("{} 没有最近成交，无法预测价格", market_symbol))?;

        log::info!("{} 预测价格: ${:.4}", market_symbol, predicted);
        Ok(predicted)
    }
}
