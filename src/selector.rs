//! Picks which published versions of an artifact are worth indexing
//!
//! The newest three releases are always kept. Each pre-release channel
//! contributes at most its newest version, and only when that version is newer
//! than everything already kept from a more stable channel.

use std::collections::BTreeSet;

use crate::version::{Channel, Version};

const LIMIT_RELEASE: usize = 3;
const LIMIT_RC: usize = 1;
const LIMIT_BETA: usize = 1;
const LIMIT_ALPHA: usize = 1;

#[derive(Default)]
struct Quotas {
    release: usize,
    rc: usize,
    beta: usize,
    alpha: usize,
}

impl Quotas {
    /// Consume one slot of the version's channel, false if it is exhausted
    fn take(&mut self, channel: Channel) -> bool {
        let (used, limit) = match channel {
            Channel::Release => (&mut self.release, LIMIT_RELEASE),
            Channel::Rc => (&mut self.rc, LIMIT_RC),
            Channel::Beta => (&mut self.beta, LIMIT_BETA),
            Channel::Alpha => (&mut self.alpha, LIMIT_ALPHA),
            Channel::Other => return false,
        };
        if *used < limit {
            *used += 1;
            true
        } else {
            false
        }
    }
}

/// Channels that veto a pre-release when they already hold a newer-or-equal pick
fn dominating_channels(channel: Channel) -> &'static [Channel] {
    match channel {
        Channel::Rc => &[Channel::Release],
        Channel::Beta => &[Channel::Release, Channel::Rc],
        Channel::Alpha => &[Channel::Release, Channel::Rc, Channel::Beta],
        Channel::Release | Channel::Other => &[],
    }
}

pub fn select_versions(versions: &[Version]) -> BTreeSet<Version> {
    let mut sorted: Vec<&Version> = versions.iter().collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut selected: Vec<&Version> = Vec::new();
    let mut quotas = Quotas::default();

    for version in sorted {
        let channel = version.channel();
        let eligible = match channel {
            Channel::Release => true,
            Channel::Other => false,
            _ => {
                let dominating = dominating_channels(channel);
                selected
                    .iter()
                    .filter(|picked| dominating.contains(&picked.channel()))
                    .all(|picked| *picked < version)
            }
        };
        if eligible && quotas.take(channel) {
            selected.push(version);
        }
    }

    selected.into_iter().cloned().collect()
}
