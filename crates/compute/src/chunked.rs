//! Adaptive chunked execution of CPU-bound work.
//!
//! Work is split into chunks of caller-defined units. Between reports the
//! chunk size is recomputed so that one reporting interval holds roughly
//! the same wall-clock cost, whatever a unit costs.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::TaskResult;
use crate::progress::UpdateInfo;
use crate::task::TaskContext;

/// Next chunk size after a report.
///
/// Scales the measured throughput (`total_processed / total_time`) to the
/// time spent since the previous report. The `+ 1` keeps the loop moving
/// when units are nearly free or nothing was measured.
pub fn next_chunk_size(since_report: Duration, total_processed: u64, total_time: Duration) -> usize {
    if total_time.is_zero() {
        return usize::try_from(total_processed)
            .unwrap_or(usize::MAX)
            .saturating_add(1);
    }
    let units = since_report.as_secs_f64() * total_processed as f64 / total_time.as_secs_f64();
    let units = units.round();
    if units >= (usize::MAX - 1) as f64 {
        usize::MAX
    } else {
        units as usize + 1
    }
}

/// Drive `process_chunk` until it reports no more work, reporting progress
/// through `ctx` in between.
///
/// `process_chunk(n, state)` advances by up to `n` units and returns how
/// many it completed; 0 ends the loop.
///
/// `on_update(state, total_processed)` only builds the report. The executor
/// itself hands it to `ctx.update`, which is also where an abort surfaces;
/// there is no other abort check. The hook is synchronous and always reports
/// on `ctx`'s own node. Async side work belongs in the calling computation,
/// before or after the chunked run.
///
/// When `ctx` is synchronous, unbounded chunks are requested until
/// `process_chunk` returns 0, with no reporting and no yielding. An
/// `initial_chunk_size` of 0 starts with a single unit and lets the first
/// measurement drive sizing.
pub async fn chunked_subtask<S, P, U>(
    ctx: &TaskContext,
    initial_chunk_size: usize,
    mut state: S,
    mut process_chunk: P,
    mut on_update: U,
) -> TaskResult<S>
where
    P: FnMut(usize, &mut S) -> usize,
    U: FnMut(&S, u64) -> UpdateInfo,
{
    if ctx.is_synchronous() {
        let mut units: u64 = 0;
        loop {
            let done = process_chunk(usize::MAX, &mut state);
            if done == 0 {
                break;
            }
            units += done as u64;
        }
        trace!(node = ctx.node_id().index(), units, "chunked run finished synchronously");
        return Ok(state);
    }

    let mut chunk_size = initial_chunk_size.max(1);
    let mut total_processed: u64 = 0;
    let mut total_time = Duration::ZERO;
    let mut since_report = Duration::ZERO;
    let mut chunks: u64 = 0;

    loop {
        let started = Instant::now();
        let done = process_chunk(chunk_size, &mut state);
        let elapsed = started.elapsed();
        if done == 0 {
            break;
        }
        chunks += 1;
        total_processed += done as u64;
        total_time += elapsed;
        since_report += elapsed;

        if ctx.should_update() {
            ctx.update(on_update(&state, total_processed)).await?;
            chunk_size = next_chunk_size(since_report, total_processed, total_time);
            since_report = Duration::ZERO;
            trace!(
                node = ctx.node_id().index(),
                processed = total_processed,
                next_chunk = chunk_size,
                "chunk size adjusted"
            );
        }
    }

    if ctx.should_update() {
        ctx.update(on_update(&state, total_processed)).await?;
    }

    trace!(
        node = ctx.node_id().index(),
        units = total_processed,
        chunks,
        elapsed_ms = total_time.as_millis() as u64,
        "chunked run finished"
    );
    Ok(state)
}
