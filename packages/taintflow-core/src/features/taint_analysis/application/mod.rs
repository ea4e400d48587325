/*
 * Taint Analysis Application Layer
 *
 * Entry point of an analysis run.
 *
 * Architecture:
 * ```
 * InfoflowConfig + InterproceduralCfg + SourceSinkOracle
 *       |
 *       v
 * Infoflow::run
 *   1. prescan sources and sinks
 *   2. forward + alias IfdsSolver on one pool, under timeout/memory watchers
 *   3. entailment pruning of sink observations
 *   4. SourceFinder pairs sinks with sources
 *       |
 *       v
 * InfoflowResults
 * ```
 *
 * Use Cases:
 * 1. Infoflow - whole-program source-to-sink analysis
 */

// ============================================================================
// Analysis driver
// ============================================================================
pub mod infoflow;
pub use infoflow::{remove_entailed_abstractions, Infoflow};
