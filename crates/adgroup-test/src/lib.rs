//! adgroup - integration test support.
//!
//! Re-exports the workspace crates under a single path so integration tests
//! can use `adgroup_test::component::` paths.

pub mod component {
    pub use adgroup_core::{config, principal, telemetry, types};
    pub use adgroup_service::{audit, error, group, permission, reconcile, store};

    pub mod db {
        pub use adgroup_db::db::*;
        pub use adgroup_db::error::{DbError, DbResult};
    }

    pub mod model {
        pub use adgroup_db::model::*;
    }
}
