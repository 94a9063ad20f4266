//! binana：Binance.US 组合再平衡工具
//!
//! 按目标资产配置把一笔美元现金分配到各个币种，并提交限价买单。
//! 也提供一个只读的 HTTP 预览服务。

mod config;     // 配置与凭证
mod handlers;   // HTTP 请求处理器
mod middleware; // 中间件
mod models;     // 数据模型定义
mod services;   // 业务逻辑服务

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::{AppConfig, Credentials};
use crate::handlers::AppState;
use crate::middleware::ApiKeyMiddleware;
use crate::services::binance::BinanceClient;
use crate::services::orders::OrderMode;
use crate::services::pricing::PriceSource;
use crate::services::rebalance::{preview_source, RebalanceOptions, RebalanceReport, Rebalancer};

#[derive(Parser)]
#[command(
    name = "binana",
    version,
    about = "Binance.US 组合再平衡工具",
    propagate_version = true
)]
struct Cli {
    /// 配置文件路径（默认依次查找 config.json、config/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 按目标配置投入现金并提交买单（默认）
    Rebalance(RebalanceArgs),
    /// 只计算分配结果，不下单
    Preview(PriceArgs),
    /// 打印当前挂单
    OpenOrders,
    /// 打印校验后的资产配置
    Allocation,
    /// 启动只读 HTTP 预览服务
    Serve,
}

#[derive(Args, Default)]
struct RebalanceArgs {
    /// 测试运行，订单只提交到测试接口
    #[arg(long, conflicts_with = "live")]
    test: bool,

    /// 提交真实订单
    #[arg(long)]
    live: bool,

    /// 跳过真实下单确认
    #[arg(long, requires = "live")]
    yes: bool,

    /// 投资金额（美元），不指定时交互输入
    #[arg(long)]
    amount: Option<f64>,

    #[command(flatten)]
    price: PriceArgs,
}

#[derive(Args, Default)]
struct PriceArgs {
    /// 价格来源，再平衡默认使用配置文件中的设置，预览默认使用均价
    #[arg(long, value_enum)]
    price_source: Option<PriceSource>,
}

/// 应用程序入口
#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 配置文件存在但无法解析时直接报错，不回退到内置配置
    let config_path = cli.config.clone().or_else(AppConfig::locate);
    let config = match &config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    // 初始化日志系统，RUST_LOG 优先于配置文件
    env_logger::init_from_env(Env::default().default_filter_or(config.log.level.as_str()));

    match &config_path {
        Some(path) => log::info!("从 {} 加载配置成功", path.display()),
        None => log::info!("未找到配置文件，使用默认配置"),
    }

    let allocation = config.allocation()?;

    match cli.command.unwrap_or(Commands::Rebalance(RebalanceArgs::default())) {
        Commands::Allocation => {
            println!("{}", serde_json::to_string_pretty(&allocation)?);
            Ok(())
        }
        Commands::OpenOrders => {
            let client = BinanceClient::new(&config.binance, Some(Credentials::from_env()?))?;
            let orders = client.get_open_orders().await?;
            println!("{}", serde_json::to_string_pretty(&orders)?);
            Ok(())
        }
        Commands::Preview(args) => {
            let source = preview_source(args.price_source);
            let client = BinanceClient::new(&config.binance, Some(Credentials::from_env()?))?;
            let rebalancer = Rebalancer::new(client, config, allocation);

            let snapshot = rebalancer.preview(source).await?;
            print!("{}", snapshot.category_table);
            print!("{}", snapshot.asset_table);
            Ok(())
        }
        Commands::Rebalance(args) => rebalance(config, allocation, args).await,
        Commands::Serve => serve(config, allocation).await,
    }
}

async fn rebalance(
    config: AppConfig,
    allocation: crate::models::Allocation,
    args: RebalanceArgs,
) -> Result<()> {
    let mode = order_mode(&args, &mut io::stdin().lock(), &mut io::stdout())?;
    let source = args.price.price_source.unwrap_or(config.trading.price_source);
    let default_amount = config.trading.investment_amount;

    let client = BinanceClient::new(&config.binance, Some(Credentials::from_env()?))?;
    let rebalancer = Rebalancer::new(client, config, allocation);

    let investment_amount = match args.amount {
        Some(amount) => validate_amount(amount)?,
        None => {
            let available = rebalancer.available_cash().await?;
            let input = prompt(
                &mut io::stdin().lock(),
                &mut io::stdout(),
                &format!(
                    "\n可用 USD: ${:.2}\n本次投资多少 USD？直接回车使用 ${:.2}。\n\n> ",
                    available, default_amount
                ),
            )?;
            parse_amount(&input, default_amount)?
        }
    };

    log::info!(
        "开始再平衡：{}，投资上限 ${:.2}，价格来源 {:?}",
        if mode == OrderMode::Live { "实盘" } else { "测试" },
        investment_amount,
        source
    );

    let report = rebalancer
        .run(&RebalanceOptions {
            mode,
            investment_amount,
            price_source: source,
        })
        .await?;

    print_report(&report)?;
    Ok(())
}

fn print_report(report: &RebalanceReport) -> Result<()> {
    for skipped in &report.skipped {
        println!("\n*!* Could not submit {} order: {} *!*", skipped.symbol, skipped.reason);
    }
    println!("{}", serde_json::to_string_pretty(&report.outcomes)?);
    println!("\nCash spent: ${:.3}", report.cash_spent);
    print!("{}", report.snapshot.category_table);
    print!("{}", report.snapshot.asset_table);
    println!("\nRuntime: {:.4} seconds", report.runtime_secs);
    Ok(())
}

/// 启动 HTTP 预览服务
async fn serve(config: AppConfig, allocation: crate::models::Allocation) -> Result<()> {
    let bind_addr = config.bind_addr();
    let api_key = config.server.api_key.clone();
    let timezone = config.timezone();

    // 预览服务在没有凭证时仍可提供配置和行情接口
    let credentials = match Credentials::from_env() {
        Ok(creds) => Some(creds),
        Err(e) => {
            log::warn!("{}，账户相关接口不可用", e);
            None
        }
    };
    if api_key.is_empty() {
        log::warn!("未设置 server.api_key，不启用认证");
    }

    let state = AppState {
        price_source: config.trading.price_source,
        rebalancer: Rebalancer::new(
            BinanceClient::new(&config.binance, credentials)?,
            config,
            allocation,
        ),
        timezone,
    };

    log::info!("启动预览服务 http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(ApiKeyMiddleware::new(api_key.clone(), timezone))
            .wrap(Logger::default())
            .configure(handlers::config)
    })
    .bind(&bind_addr)
    .with_context(|| format!("绑定 {} 失败", bind_addr))?
    .run()
    .await?;

    Ok(())
}

/// 确定下单模式，真实下单需要二次确认
fn order_mode<R: BufRead, W: Write>(
    args: &RebalanceArgs,
    input: &mut R,
    output: &mut W,
) -> Result<OrderMode> {
    if args.test {
        return Ok(OrderMode::Test);
    }
    if !args.live && is_yes(&prompt(input, output, "是否为测试运行？(y/n) > ")?) {
        return Ok(OrderMode::Test);
    }
    if args.yes || is_yes(&prompt(input, output, "确定要提交真实订单吗？(y/n) > ")?) {
        Ok(OrderMode::Live)
    } else {
        log::info!("未确认真实下单，按测试运行");
        Ok(OrderMode::Test)
    }
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// 解析投资金额，空输入使用默认值
fn parse_amount(input: &str, default: f64) -> Result<f64> {
    let input = input.trim().trim_start_matches('$').replace(',', "");
    if input.is_empty() {
        return Ok(default);
    }
    let amount: f64 = input
        .parse()
        .with_context(|| format!("无效的金额: {}", input))?;
    validate_amount(amount)
}

fn validate_amount(amount: f64) -> Result<f64> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(anyhow!("投资金额必须大于 0: {}", amount))
    }
}
