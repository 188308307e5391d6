//! Synchronizer
//!
//! [`sync`] groups interval timers so that, while enabled, they all tick on
//! one leader's cadence. Nothing new is scheduled: the leader's tick
//! handler is replaced with a broadcast that runs every member's original
//! handler, and the other members' handlers become no-ops. Each member
//! still applies its own active flag and tick limit to the ticks it is
//! handed; the leader's active flag decides whether a firing is broadcast
//! at all.
//!
//! The leader is the member with the smallest duration when `sync` is
//! called; the earliest member wins ties. It does not change afterwards.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};

use super::interval::{IntervalId, IntervalTimer, TickControl, TickHandler};

/// Build a synchronizer over `members`, initially disabled.
///
/// Fails with [`Error::InvalidArgument`] when `members` is empty, and with
/// [`Error::DurationProducer`] when a member's duration cannot be resolved.
/// A timer listed twice is kept once, at its first position.
pub fn sync<I, T>(members: I) -> Result<Synchronizer>
where
    I: IntoIterator<Item = T>,
    T: AsRef<IntervalTimer>,
{
    let mut unique: Vec<IntervalTimer> = Vec::new();
    for member in members {
        let member = member.as_ref();
        if !unique.contains(member) {
            unique.push(member.clone());
        }
    }
    Synchronizer::new(unique)
}

/// Drives a group of interval timers from the leader's underlying timer.
pub struct Synchronizer {
    members: Vec<IntervalTimer>,
    leader: usize,
    saved: IndexMap<IntervalId, TickHandler>,
    enabled: AtomicBool,
}

impl Synchronizer {
    fn new(members: Vec<IntervalTimer>) -> Result<Self> {
        if members.is_empty() {
            return Err(Error::invalid_argument("sync() needs at least one interval"));
        }

        let mut leader = 0;
        let mut shortest = members[0].duration()?;
        for (index, member) in members.iter().enumerate().skip(1) {
            let duration = member.duration()?;
            if duration < shortest {
                shortest = duration;
                leader = index;
            }
        }

        let saved = members
            .iter()
            .map(|member| (member.id(), member.tick_handler()))
            .collect();

        tracing::debug!(
            leader = %members[leader].id(),
            period_ms = shortest,
            members = members.len(),
            "synchronizer created"
        );

        Ok(Self {
            members,
            leader,
            saved,
            enabled: AtomicBool::new(false),
        })
    }

    /// The member whose underlying timer drives the group.
    pub fn leader(&self) -> &IntervalTimer {
        &self.members[self.leader]
    }

    /// All members, in the order given to [`sync`].
    pub fn members(&self) -> &[IntervalTimer] {
        &self.members
    }

    /// Whether synchronization is on.
    pub fn is_synced(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Route every member's ticks through the leader. No-op when enabled.
    ///
    /// The leader's underlying timer is restarted so the broadcast runs on
    /// a fresh phase, and started if it was inert.
    pub fn enable(&self) -> Result<()> {
        if self.enabled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let handlers: Vec<TickHandler> = self.saved.values().cloned().collect();
        let leader = self.leader().downgrade();
        let broadcast: TickHandler = Arc::new(move || {
            let Some(leader) = leader.upgrade() else { return };
            if !leader.is_active() {
                return;
            }
            for handler in &handlers {
                handler();
            }
        });
        let silenced: TickHandler = Arc::new(|| {});

        for (index, member) in self.members.iter().enumerate() {
            if index == self.leader {
                member.set_tick_handler(broadcast.clone());
            } else {
                member.set_tick_handler(silenced.clone());
            }
        }

        let leader = self.leader();
        leader.bump_generation();
        leader.ensure_running()?;
        tracing::debug!(leader = %leader.id(), "synchronization enabled");
        Ok(())
    }

    /// Give every member back its own tick handling. No-op when disabled.
    ///
    /// Every member's underlying timer is cleared. The leader is restarted
    /// here; the other members start again on their next read.
    pub fn disable(&self) -> Result<()> {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        for member in &self.members {
            if let Some(handler) = self.saved.get(&member.id()) {
                member.set_tick_handler(handler.clone());
            }
            member.bump_generation();
        }

        let leader = self.leader();
        leader.ensure_running()?;
        tracing::debug!(leader = %leader.id(), "synchronization disabled");
        Ok(())
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        if let Err(err) = self.disable() {
            tracing::warn!(error = %err, "failed to restart leader while dropping synchronizer");
        }
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("leader", &self.leader().id())
            .field("members", &self.members.iter().map(|m| m.id()).collect::<Vec<_>>())
            .field("enabled", &self.is_synced())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::timer::LimitedInterval;

    #[test]
    fn empty_group_is_rejected() {
        let err = sync(Vec::<IntervalTimer>::new()).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn leader_is_shortest_first_on_ties() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 200);
        let b = IntervalTimer::new(clock.clone(), 100);
        let c = IntervalTimer::new(clock.clone(), 100);

        let group = sync([&a, &b, &c]).unwrap();
        assert_eq!(group.leader(), &b);
        assert!(!group.is_synced());
    }

    #[test]
    fn duplicate_members_are_kept_once() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 100);
        let b = IntervalTimer::new(clock.clone(), 50);

        let group = sync([&a, &b, &a]).unwrap();
        assert_eq!(group.members().len(), 2);
    }

    #[test]
    fn enable_and_disable_are_idempotent() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 100);
        let b = IntervalTimer::new(clock.clone(), 300);
        let group = sync([&a, &b]).unwrap();

        group.enable().unwrap();
        group.enable().unwrap();
        assert!(group.is_synced());

        clock.advance(100);
        assert_eq!(b.tick_count().unwrap(), 1);

        group.disable().unwrap();
        group.disable().unwrap();
        assert!(!group.is_synced());
    }

    #[test]
    fn leader_pause_gates_the_group() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 100);
        let b = IntervalTimer::new(clock.clone(), 500);
        let group = sync([&a, &b]).unwrap();
        group.enable().unwrap();

        a.pause();
        clock.advance(300);
        assert_eq!(a.tick_count().unwrap(), 0);
        assert_eq!(b.tick_count().unwrap(), 0);
    }

    #[test]
    fn member_pause_only_affects_that_member() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 100);
        let b = IntervalTimer::new(clock.clone(), 500);
        let group = sync([&a, &b]).unwrap();
        group.enable().unwrap();

        b.pause();
        clock.advance(300);
        assert_eq!(a.tick_count().unwrap(), 3);
        assert_eq!(b.tick_count().unwrap(), 0);
    }

    #[test]
    fn limited_member_completes_inside_group() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 100);
        let limited = LimitedInterval::new(clock.clone(), 400, 2).unwrap();
        let group = sync([a.clone(), limited.as_interval().clone()]).unwrap();
        group.enable().unwrap();

        clock.advance(500);
        assert_eq!(a.tick_count().unwrap(), 5);
        assert_eq!(limited.tick_count().unwrap(), 2);
        assert!(limited.is_completed());
    }

    #[test]
    fn drop_restores_member_handlers() {
        let clock = VirtualClock::shared();
        let a = IntervalTimer::new(clock.clone(), 100);
        let b = IntervalTimer::new(clock.clone(), 250);
        {
            let group = sync([&a, &b]).unwrap();
            group.enable().unwrap();
            clock.advance(100);
        }

        b.current().unwrap();
        clock.advance(250);
        assert_eq!(b.tick_count().unwrap(), 2);
        assert_eq!(a.tick_count().unwrap(), 3);
    }
}
