use super::{Action, approve, server};
use anyhow::Result;

pub(super) async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::Approve(args) => approve::execute(args).await,
    }
}
