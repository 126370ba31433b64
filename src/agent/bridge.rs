//! Agent event bridge.
//!
//! Translates the event stream of one run into reducer messages tagged with
//! that run's id. One bridge task per run, one FIFO channel in and one out,
//! so per-run order is preserved end to end.

use super::{AgentEvent, RunId};
use crate::session::{RunUpdate, SessionMsg};
use tokio::sync::mpsc;

/// Map one agent event to the reducer's view of it.
///
/// Events the session has no use for map to `None`.
pub fn translate(event: AgentEvent) -> Option<RunUpdate> {
    let update = match event {
        AgentEvent::Text { delta } => RunUpdate::Text(delta),
        AgentEvent::Thinking { delta } => RunUpdate::Thinking(delta),
        AgentEvent::ToolStart {
            call_id,
            name,
            arguments,
        } => RunUpdate::ToolStarted {
            call_id,
            name,
            arguments,
        },
        AgentEvent::ToolUpdate { call_id, output } => RunUpdate::ToolProgress { call_id, output },
        AgentEvent::ToolEnd {
            call_id,
            output,
            is_error,
        } => RunUpdate::ToolFinished {
            call_id,
            output,
            is_error,
        },
        AgentEvent::Usage {
            input_tokens,
            output_tokens,
        } => RunUpdate::Usage {
            input_tokens,
            output_tokens,
        },
        AgentEvent::Error { message } => RunUpdate::Error(message),
        AgentEvent::Unknown => return None,
    };
    Some(update)
}

/// Forward every event of run `run_id` to `sink` until either side closes.
///
/// Returns the number of messages forwarded.
pub async fn pump(
    run_id: RunId,
    mut events: mpsc::UnboundedReceiver<AgentEvent>,
    sink: mpsc::UnboundedSender<SessionMsg>,
) -> usize {
    let mut forwarded = 0;
    while let Some(event) = events.recv().await {
        let Some(update) = translate(event) else {
            continue;
        };
        if sink.send(SessionMsg::Run { run_id, update }).is_err() {
            tracing::debug!(run_id, "session channel closed; bridge stopping");
            break;
        }
        forwarded += 1;
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(delta: &str) -> AgentEvent {
        AgentEvent::Text {
            delta: delta.to_string(),
        }
    }

    #[tokio::test]
    async fn pump_preserves_order_and_tags_run() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        for delta in ["a", "b", "c"] {
            events_tx.send(text(delta)).expect("send");
        }
        events_tx.send(AgentEvent::Unknown).expect("send");
        events_tx
            .send(AgentEvent::Usage {
                input_tokens: 3,
                output_tokens: 1,
            })
            .expect("send");
        drop(events_tx);

        assert_eq!(pump(7, events_rx, sink_tx).await, 4);

        let mut seen = Vec::new();
        while let Ok(msg) = sink_rx.try_recv() {
            match msg {
                SessionMsg::Run { run_id, update } => {
                    assert_eq!(run_id, 7);
                    seen.push(update);
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
        assert_eq!(
            seen,
            vec![
                RunUpdate::Text("a".into()),
                RunUpdate::Text("b".into()),
                RunUpdate::Text("c".into()),
                RunUpdate::Usage {
                    input_tokens: 3,
                    output_tokens: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn pump_stops_when_sink_closes() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        drop(sink_rx);
        events_tx.send(text("lost")).expect("send");
        assert_eq!(pump(1, events_rx, sink_tx).await, 0);
    }

    #[test]
    fn translate_maps_tool_events() {
        assert_eq!(
            translate(AgentEvent::ToolEnd {
                call_id: "c".into(),
                output: "boom".into(),
                is_error: true,
            }),
            Some(RunUpdate::ToolFinished {
                call_id: "c".into(),
                output: "boom".into(),
                is_error: true,
            })
        );
        assert_eq!(
            translate(AgentEvent::Error {
                message: "bad".into()
            }),
            Some(RunUpdate::Error("bad".into()))
        );
    }
}
