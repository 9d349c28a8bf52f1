// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::errors::Result;
use crate::harness::{HarnessContext, HarnessTest, support};
use crate::scenarios::DISCOVERY_SUITE;
use crate::scenarios::steps::{Check, DATASTORE_NAME, Step, discover_config, run_case};

/// Datastore over every free disk matching the configured filter, after a rescan.
pub struct VmfsDatastoreDiscovery;

#[async_trait]
impl HarnessTest for VmfsDatastoreDiscovery {
    fn id(&self) -> &'static str {
        "vmfs_disks.discovery_via_data_source"
    }

    fn suite(&self) -> &'static str {
        DISCOVERY_SUITE
    }

    async fn execute(&self, ctx: &HarnessContext) -> Result<()> {
        ctx.config.pre_check()?;
        let host = support::resolve_host(ctx).await?;
        let filter = ctx.config.require_regexp()?;

        run_case(
            ctx,
            vec![Step::new(discover_config(DATASTORE_NAME, &host, filter)).check(Check::Exists)],
        )
        .await
    }
}
