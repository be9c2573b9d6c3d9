//! End-to-end scenarios: one-off block rewrites of a small web front end,
//! expressed as plan files and applied to a temporary workspace.

mod front_end_plans;
