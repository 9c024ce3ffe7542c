//! Cross-crate scenario tests for concrete end-to-end scenarios A-F, built
//! against real `git2` repositories and `tempfile` worktrees with
//! disposable fixtures. Kernel- and store-level unit tests live beside
//! their modules in `ralph-kernel`/`ralph-core`; this crate only covers
//! behavior that needs a real filesystem-backed repository to observe.

#![cfg(test)]

mod fixtures;

mod scenario_a_trivial_ticket;
mod scenario_b_review_fix_gating;
mod scenario_c_rebase_conflict;
mod scenario_d_speculative_window;
mod scenario_e_resume;
mod scenario_f_repeating_discovery;
