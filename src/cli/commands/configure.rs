//! `stagely configure [--cluster]`

use crate::cluster::ClusterController;
use crate::credentials::CONFIGURE_RETRIES;
use crate::error::Result;
use crate::process::ProcessRunner;
use crate::prompt::Prompter;

/// Save a working AWS profile, then optionally go straight on to cluster creation
pub(super) async fn execute_configure<R, P>(
    controller: &ClusterController<'_, R, P>,
    create_cluster: bool,
) -> Result<i32>
where
    R: ProcessRunner,
    P: Prompter,
{
    controller.configure(CONFIGURE_RETRIES).await?;

    if create_cluster {
        return controller.create_cluster().await;
    }

    Ok(0)
}
