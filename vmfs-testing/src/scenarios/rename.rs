// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::errors::Result;
use crate::harness::{HarnessContext, HarnessTest, support};
use crate::scenarios::DATASTORE_SUITE;
use crate::scenarios::steps::{
    Check, DATASTORE_NAME, RENAMED_DATASTORE_NAME, Step, run_case, static_config,
};

pub struct VmfsDatastoreRename;

#[async_trait]
impl HarnessTest for VmfsDatastoreRename {
    fn id(&self) -> &'static str {
        "vmfs_datastore.rename_datastore"
    }

    fn suite(&self) -> &'static str {
        DATASTORE_SUITE
    }

    async fn execute(&self, ctx: &HarnessContext) -> Result<()> {
        ctx.config.pre_check()?;
        let host = support::resolve_host(ctx).await?;
        let disk0 = ctx.config.require_disk(0)?;

        run_case(
            ctx,
            vec![
                Step::new(static_config(DATASTORE_NAME, &host, &[disk0])).check(Check::Exists),
                Step::new(static_config(RENAMED_DATASTORE_NAME, &host, &[disk0]))
                    .check(Check::Exists)
                    .check(Check::HasName(RENAMED_DATASTORE_NAME.to_string())),
            ],
        )
        .await
    }
}
