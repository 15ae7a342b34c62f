//! 命令行入口：读取配置，装配 Agent，执行一条任务指令
//!
//! 用法: talon [指令] [单元名]
//! 例如: talon "在1号空域巡逻，高度5000，速度200" 红方-001

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use talon::agent::Agent;
use talon::config::load_config;
use talon::pipeline::{EventSink, GoalSpec, Task};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    talon::observability::init();

    let cfg = load_config(None).context("加载配置失败")?;

    let mut args = std::env::args().skip(1);
    let directive = args
        .next()
        .unwrap_or_else(|| "在1号空域巡逻，高度5000，速度200".to_string());
    let unit = args.next().unwrap_or_else(|| "红方-001".to_string());

    // Ctrl-C 触发取消，会话在下一周期顶部收尾退出
    let cancel = CancellationToken::new();
    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到 Ctrl-C，请求会话取消");
            ctrlc_cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let agent =
        Agent::from_config(&cfg, EventSink::attached(tx), cancel).context("Agent 装配失败")?;

    // 事件流逐条打印为 JSON 行
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        }
    });

    let task = Task {
        directive,
        unit,
        constraints: Vec::new(),
        max_cycles: None,
        goal: GoalSpec::Manual,
    };
    let report = agent.run_task(task).await.context("会话执行失败")?;
    drop(agent);
    let _ = printer.await;

    println!();
    println!(
        "会话 {} 结束: {}（{} 个周期，{} 条账本记录）",
        report.session_id, report.termination, report.cycles_used, report.ledger_entries
    );
    for line in &report.tail_summary {
        println!("  {line}");
    }
    if let Some(path) = &report.replay_path {
        println!("复盘文件: {}", path.display());
    }
    Ok(())
}
