//! Integration tests: wizard, coordinator, and repository wired together
//! against a deterministic in-memory analysis service.

mod mock_service;
mod adjustment_flow;
mod repository_flow;
mod wizard_flow;
