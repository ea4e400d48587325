/*
 * IFDS Problems
 *
 * The two flow-function families the solvers are instantiated with.
 *
 * Architecture:
 * - infoflow_problem.rs: forward taint propagation, rule chain + generic
 *   transfer over assignments, calls, returns and call-to-return edges
 * - alias_problem.rs: backward alias search over the reversed ICFG, feeding
 *   aliases back into the forward solver
 */

mod alias_problem;
mod infoflow_problem;

pub use alias_problem::AliasProblem;
pub use infoflow_problem::InfoflowProblem;
