//! Call trace utilities for dependency extraction
//!
//! This module fetches `callTracer` call trees and pulls out the calls made
//! underneath a target contract.
//!
//! Extraction rules:
//! - Every frame whose `to` is the target starts a capture. All frames below
//!   it are recorded unconditionally, whatever their address.
//! - The source of a recorded call is the `to` of its parent frame, and the
//!   direct children of a matched frame sit at depth 1.
//! - Frames outside a capture are only searched, never recorded, so the
//!   target can be found at any nesting level and more than once.

use crate::gateway::ChainGateway;
use crate::types::{format_address, parse_address, CallFrame, TxHash};
use alloy_primitives::Address;
use tracing::{debug, warn};

/// A single call observed below the target contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Contract that issued the call.
    pub caller: Address,
    /// Address that received the call.
    pub callee: Address,
    /// Call type as reported by the tracer (CALL, DELEGATECALL, ...).
    pub call_type: String,
    /// Nesting level below the matched target frame, starting at 1.
    pub depth: u32,
}

/// Fetch the call tree of one transaction.
///
/// Failures are logged and turned into `None` so one bad transaction never
/// aborts the batch it belongs to.
pub async fn fetch_trace<G: ChainGateway + ?Sized>(gateway: &G, tx_hash: TxHash) -> Option<CallFrame> {
    let shown = format!("0x{:x}", tx_hash);
    debug!(tx = %shown, "Tracing transaction");
    match gateway.trace_transaction(tx_hash).await {
        Ok(Some(trace)) => Some(trace),
        Ok(None) => {
            warn!(tx = %shown, "Node returned no trace");
            None
        }
        Err(e) => {
            warn!(tx = %shown, "Error tracing transaction: {:#}", e);
            None
        }
    }
}

/// Collect every call made below each occurrence of `target` in `trace`.
///
/// The walk is depth-first in tracer order and uses an explicit stack, so
/// the tree depth is bounded only by what the RPC layer can decode.
pub fn extract_subcalls(trace: &CallFrame, target: Address) -> Vec<CallRecord> {
    let mut out = Vec::new();

    // (frame, Some((caller, depth)) while capturing)
    let mut stack: Vec<(&CallFrame, Option<(Address, u32)>)> = vec![(trace, None)];

    while let Some((node, capture)) = stack.pop() {
        let to = node.to.as_deref().map(parse_address);

        let child_capture = match capture {
            Some((caller, depth)) => match to {
                Some(Ok(callee)) => {
                    out.push(CallRecord {
                        caller,
                        callee,
                        call_type: node.call_type().to_string(),
                        depth,
                    });
                    Some((callee, depth + 1))
                }
                _ => {
                    warn!(
                        caller = %format_address(&caller),
                        from = ?node.from,
                        to = ?node.to,
                        "Skipping call frame without a valid recipient"
                    );
                    continue;
                }
            },
            None => match to {
                Some(Ok(address)) if address == target => Some((address, 1)),
                _ => None,
            },
        };

        for child in node.children().iter().rev() {
            stack.push((child, child_capture));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, frame, tx, MockGateway};

    #[test]
    fn test_single_child_of_root_target() {
        let root = frame("CALL", addr(9), addr(1), vec![frame("CALL", addr(1), addr(2), vec![])]);

        let records = extract_subcalls(&root, addr(1));
        assert_eq!(
            records,
            vec![CallRecord { caller: addr(1), callee: addr(2), call_type: "CALL".into(), depth: 1 }]
        );
    }

    #[test]
    fn test_target_matched_case_insensitively() {
        let mut root = frame("CALL", addr(9), addr(1), vec![frame("CALL", addr(1), addr(2), vec![])]);
        root.to = Some(format_address(&addr(1)).to_uppercase().replacen("0X", "0x", 1));

        let records = extract_subcalls(&root, addr(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].caller, addr(1));
    }

    #[test]
    fn test_nested_calls_source_is_parent_and_depth_increments() {
        // target(1) -> 2 -> 3 -> 4, and target -> 5
        let root = frame(
            "CALL",
            addr(9),
            addr(1),
            vec![
                frame(
                    "DELEGATECALL",
                    addr(1),
                    addr(2),
                    vec![frame("STATICCALL", addr(2), addr(3), vec![frame("CALL", addr(3), addr(4), vec![])])],
                ),
                frame("CALL", addr(1), addr(5), vec![]),
            ],
        );

        let records = extract_subcalls(&root, addr(1));
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.caller, r.callee, r.call_type.as_str(), r.depth))
            .collect();
        assert_eq!(
            summary,
            vec![
                (addr(1), addr(2), "DELEGATECALL", 1),
                (addr(2), addr(3), "STATICCALL", 2),
                (addr(3), addr(4), "CALL", 3),
                (addr(1), addr(5), "CALL", 1),
            ]
        );
    }

    #[test]
    fn test_depth_grows_by_one_along_every_path() {
        let root = frame(
            "CALL",
            addr(9),
            addr(1),
            vec![frame(
                "CALL",
                addr(1),
                addr(2),
                vec![
                    frame("CALL", addr(2), addr(3), vec![frame("CALL", addr(3), addr(6), vec![])]),
                    frame("CALL", addr(2), addr(4), vec![]),
                ],
            )],
        );

        let records = extract_subcalls(&root, addr(1));
        for record in &records {
            if record.depth == 1 {
                assert_eq!(record.caller, addr(1));
            } else {
                // The caller was itself recorded one level up.
                assert!(records
                    .iter()
                    .any(|parent| parent.callee == record.caller && parent.depth + 1 == record.depth));
            }
        }
    }

    #[test]
    fn test_target_deeper_in_tree_and_seen_twice() {
        // eoa -> router(7) -> target(1) -> 2
        //                  -> target(1) -> 3
        let root = frame(
            "CALL",
            addr(9),
            addr(7),
            vec![
                frame("CALL", addr(7), addr(1), vec![frame("CALL", addr(1), addr(2), vec![])]),
                frame("CALL", addr(7), addr(1), vec![frame("STATICCALL", addr(1), addr(3), vec![])]),
            ],
        );

        let records = extract_subcalls(&root, addr(1));
        let callees: Vec<_> = records.iter().map(|r| (r.callee, r.depth)).collect();
        assert_eq!(callees, vec![(addr(2), 1), (addr(3), 1)]);
    }

    #[test]
    fn test_reentry_inside_capture_keeps_counting() {
        // target(1) -> 2 -> target(1) -> 3
        let root = frame(
            "CALL",
            addr(9),
            addr(1),
            vec![frame(
                "CALL",
                addr(1),
                addr(2),
                vec![frame("CALL", addr(2), addr(1), vec![frame("CALL", addr(1), addr(3), vec![])])],
            )],
        );

        let records = extract_subcalls(&root, addr(1));
        let summary: Vec<_> = records.iter().map(|r| (r.caller, r.callee, r.depth)).collect();
        assert_eq!(
            summary,
            vec![(addr(1), addr(2), 1), (addr(2), addr(1), 2), (addr(1), addr(3), 3)]
        );
    }

    #[test]
    fn test_target_absent_yields_nothing() {
        let root = frame("CALL", addr(9), addr(7), vec![frame("CALL", addr(7), addr(2), vec![])]);
        assert!(extract_subcalls(&root, addr(1)).is_empty());
    }

    #[test]
    fn test_frame_without_recipient_is_skipped_with_its_subtree() {
        let mut broken = frame("CREATE", addr(1), addr(0), vec![frame("CALL", addr(0), addr(4), vec![])]);
        broken.to = None;
        let root = frame("CALL", addr(9), addr(1), vec![broken, frame("CALL", addr(1), addr(2), vec![])]);

        let records = extract_subcalls(&root, addr(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].callee, addr(2));
    }

    #[test]
    fn test_call_chain_at_evm_depth_limit() {
        let mut chain = frame("CALL", addr(1023), addr(1024), vec![]);
        for n in (1..1024).rev() {
            chain = frame("CALL", addr(n - 1), addr(n), vec![chain]);
        }

        let records = extract_subcalls(&chain, addr(1));
        assert_eq!(records.len(), 1023);
        assert_eq!(records.last().map(|r| (r.callee, r.depth)), Some((addr(1024), 1023)));
    }

    #[tokio::test]
    async fn test_fetch_trace_failure_is_none() {
        let mut mock = MockGateway::new()
            .with_tx(tx(1), frame("CALL", addr(9), addr(1), vec![]));
        mock.failing_traces.insert(tx(2));

        assert!(fetch_trace(&mock, tx(1)).await.is_some());
        assert!(fetch_trace(&mock, tx(2)).await.is_none());
        assert!(fetch_trace(&mock, tx(3)).await.is_none());
    }
}
