use crate::dispatch::AstEntry;
use crate::mode::LockMode;
use crate::owner::AstCapability;
use crate::resource::ResourceState;
use crate::Error;

/// Glimpse work list for one size query, collected under the resource guard.
#[derive(Debug, Default)]
pub(crate) struct GlimpseScan {
    pub entries: Vec<AstEntry>,
    /// A writer past the threshold exists but cannot be asked; the cached
    /// LVB is the best answer available.
    pub unreachable_writer: bool,
}

/// Walk the write-mode interval indices highest-first and pick, per
/// qualifying range, one representative lock whose owner can answer a
/// glimpse.
///
/// Speculative (read-ahead / lock-ahead) locks do not reliably reflect file
/// size, so the walk keeps collecting past them; the first non-speculative
/// writer is authoritative and ends the walk. An owner mid-destruction
/// (`Unsupported`) poisons the whole query: better a stale-object error
/// than a wrong size.
pub(crate) fn collect(st: &ResourceState, threshold: u64) -> Result<GlimpseScan, Error> {
    let mut scan = GlimpseScan::default();
    'modes: for mode in LockMode::ALL.into_iter().filter(|m| m.is_write()) {
        let Some(tree) = st.trees.get(&mode) else {
            continue;
        };
        for node in tree.above(threshold) {
            let mut representative = None;
            for &l in &node.locks {
                let Some(rec) = st.arena.get(l) else {
                    continue;
                };
                match rec.owner.glimpse_capability() {
                    AstCapability::Unsupported => return Err(Error::StaleObject(st.key)),
                    AstCapability::Unreachable => scan.unreachable_writer = true,
                    AstCapability::Available => {
                        representative = Some(rec);
                        break;
                    }
                }
            }
            if let Some(rec) = representative {
                let speculative = rec.speculative;
                scan.entries.push(AstEntry {
                    id: rec.id,
                    owner: rec.owner.clone(),
                    desc: rec.desc(st.key),
                });
                if !speculative {
                    break 'modes;
                }
            }
        }
    }
    Ok(scan)
}
