//! Preconditions for mining requests

use crate::chain::PeerNetwork;
use crate::{Error, Result};

/// Check that the node is in a state where handing out or accepting work
/// makes sense. Never touches any state.
pub fn check(
    network: Option<&dyn PeerNetwork>,
    mine_on_demand: bool,
    initial_sync: bool,
) -> Result<()> {
    let network = network.ok_or(Error::NetworkingDisabled)?;

    if network.peer_count() == 0 && !mine_on_demand {
        return Err(Error::NotConnected);
    }

    if initial_sync && !mine_on_demand {
        return Err(Error::StillSyncing);
    }

    Ok(())
}
