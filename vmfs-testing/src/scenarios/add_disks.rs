// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::errors::Result;
use crate::harness::{HarnessContext, HarnessTest, support};
use crate::scenarios::DATASTORE_SUITE;
use crate::scenarios::steps::{Check, DATASTORE_NAME, Step, run_case, static_config};

/// Create on one disk, then grow to three through an update.
pub struct VmfsDatastoreAddDisks;

#[async_trait]
impl HarnessTest for VmfsDatastoreAddDisks {
    fn id(&self) -> &'static str {
        "vmfs_datastore.add_disks_through_update"
    }

    fn suite(&self) -> &'static str {
        DATASTORE_SUITE
    }

    async fn execute(&self, ctx: &HarnessContext) -> Result<()> {
        ctx.config.pre_check()?;
        let host = support::resolve_host(ctx).await?;
        let disks = [
            ctx.config.require_disk(0)?,
            ctx.config.require_disk(1)?,
            ctx.config.require_disk(2)?,
        ];

        run_case(
            ctx,
            vec![
                Step::new(static_config(DATASTORE_NAME, &host, &disks[..1])).check(Check::Exists),
                Step::new(static_config(DATASTORE_NAME, &host, &disks))
                    .check(Check::Exists)
                    .check(Check::CoversDisks(
                        disks.iter().map(|disk| disk.to_string()).collect(),
                    )),
            ],
        )
        .await
    }
}
