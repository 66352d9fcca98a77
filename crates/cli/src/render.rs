//! Printing results and streams to stdout.

use std::io::{self, Write};

use clawflow_core::agent::{AgentResult, AgentResultStream};
use clawflow_core::stream::{RunEvent, StepEvent};
use clawflow_flow::FlowEvent;
use tokio::sync::mpsc;

pub fn print_results(out: &mut impl Write, results: &[AgentResult]) -> io::Result<()> {
    for (i, result) in results.iter().enumerate() {
        if !result.reasoning.is_empty() {
            writeln!(out, "[{}] (thinking) {}", i + 1, result.reasoning)?;
        }
        writeln!(out, "[{}] {}", i + 1, result.content)?;
    }
    Ok(())
}

/// Print one phase as it grows. Increments carry the whole text so far, so
/// only the new suffix is written.
async fn print_phase(out: &mut impl Write, rx: &mut mpsc::Receiver<StepEvent>) -> io::Result<()> {
    let mut printed = String::new();
    let mut last = AgentResultStream::default();
    while let Some(event) = rx.recv().await {
        match event {
            StepEvent::Increment(item) => {
                let fresh = item.content.strip_prefix(printed.as_str()).unwrap_or(&item.content);
                write!(out, "{fresh}")?;
                out.flush()?;
                printed = item.content.clone();
                last = item;
            }
            StepEvent::StepDone => break,
        }
    }
    if !printed.is_empty() {
        writeln!(out)?;
    }
    for call in last.tool_calls.iter().flatten() {
        writeln!(out, "-> {}({})", call.name, call.arguments)?;
    }
    Ok(())
}

pub async fn print_run(out: &mut impl Write, mut events: mpsc::Receiver<RunEvent>) -> io::Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Step(mut phase) => print_phase(out, &mut phase).await?,
            RunEvent::RunDone => break,
        }
    }
    Ok(())
}

pub async fn print_flow(out: &mut impl Write, mut events: mpsc::Receiver<FlowEvent>) -> io::Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            FlowEvent::Phase(mut phase) => print_phase(out, &mut phase).await?,
            FlowEvent::Executor { step_index, events } => {
                writeln!(out, "--- step {step_index} ---")?;
                print_run(out, events).await?;
            }
            FlowEvent::FlowDone => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawflow_core::message::MessageToolCall;

    #[tokio::test]
    async fn phases_print_only_new_text() {
        let (tx, rx) = mpsc::channel(8);
        let (phase_tx, phase_rx) = mpsc::channel(8);
        tx.send(RunEvent::Step(phase_rx)).await.unwrap();
        for text in ["Hel", "Hello", "Hello world"] {
            phase_tx
                .send(StepEvent::Increment(AgentResultStream::content(text)))
                .await
                .unwrap();
        }
        phase_tx
            .send(StepEvent::Increment(AgentResultStream {
                content: "Hello world".into(),
                tool_calls: Some(vec![MessageToolCall {
                    id: "c".into(),
                    name: "terminate".into(),
                    arguments: r#"{"status":"success"}"#.into(),
                }]),
                ..Default::default()
            }))
            .await
            .unwrap();
        phase_tx.send(StepEvent::StepDone).await.unwrap();
        tx.send(RunEvent::RunDone).await.unwrap();

        let mut out = Vec::new();
        print_run(&mut out, rx).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Hello world\n-> terminate({\"status\":\"success\"})\n"
        );
    }

    #[test]
    fn results_are_numbered() {
        let mut out = Vec::new();
        print_results(
            &mut out,
            &[AgentResult::new("why", "first"), AgentResult::content("second")],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[1] (thinking) why\n[1] first\n[2] second\n"
        );
    }
}
