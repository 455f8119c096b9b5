use crate::renderer::{RenderView, Renderer};
use kinetree_kernel::{CommitNotice, World, WorldModel};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Tracks the latest committed snapshot of a world through commit notices.
///
/// Suitable for a render loop on another thread: it never blocks writers
/// and only ever holds whole commits.
pub struct SnapshotFollower {
    notices: Receiver<CommitNotice>,
    version: u64,
    model: Arc<WorldModel>,
}

impl SnapshotFollower {
    pub fn attach(world: &World) -> Self {
        // Subscribe first so no commit falls between the two reads.
        let notices = world.subscribe();
        let (version, model) = world.versioned_snapshot();
        Self {
            notices,
            version,
            model,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn latest(&self) -> &Arc<WorldModel> {
        &self.model
    }

    /// Take any pending notices without blocking. Returns whether the
    /// snapshot advanced.
    pub fn poll(&mut self) -> bool {
        let mut advanced = false;
        while let Ok(notice) = self.notices.try_recv() {
            advanced |= self.accept(notice);
        }
        advanced
    }

    /// Wait up to `timeout` for a newer commit.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.notices.recv_timeout(timeout) {
            Ok(notice) => {
                let advanced = self.accept(notice);
                self.poll() || advanced
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("world dropped, follower detached");
                false
            }
        }
    }

    /// Catch up, then render the latest snapshot.
    pub fn render<R: Renderer>(&mut self, renderer: &R, view: &RenderView) -> R::Output {
        self.poll();
        renderer.render(&self.model, view)
    }

    fn accept(&mut self, notice: CommitNotice) -> bool {
        if notice.version <= self.version {
            return false;
        }
        tracing::trace!(version = notice.version, events = notice.events.len(), "snapshot advanced");
        self.version = notice.version;
        self.model = notice.model;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::PoseRenderer;
    use glam::DVec3;
    use kinetree_kernel::{Body, Connection, DegreeOfFreedom, Pose, PrefixedName, WorldConfig};
    use std::thread;

    fn drawer_world() -> World {
        let mut m = WorldModel::new();
        m.add_body(Body::new("root")).unwrap();
        m.add_body(Body::new("drawer")).unwrap();
        m.add_connection(Connection::prismatic(
            "root",
            "drawer",
            Pose::default(),
            DVec3::X,
            DegreeOfFreedom::new("slide"),
        ))
        .unwrap();
        World::from_model(m, WorldConfig::default()).unwrap()
    }

    fn drawer_x(poses: &std::collections::BTreeMap<PrefixedName, glam::DMat4>) -> f64 {
        poses[&PrefixedName::new("drawer")].w_axis.x
    }

    #[test]
    fn follows_commits_not_open_transactions() {
        let world = drawer_world();
        let mut follower = SnapshotFollower::attach(&world);
        assert_eq!(follower.version(), 0);

        let tx = world.modify_world().unwrap();
        tx.set_position(&PrefixedName::new("slide"), 0.3).unwrap();
        assert!(!follower.poll());
        assert_eq!(drawer_x(&follower.render(&PoseRenderer, &RenderView::default())), 0.0);

        tx.commit().unwrap();
        assert!(follower.poll());
        assert_eq!(follower.version(), 1);
        assert_eq!(drawer_x(&follower.render(&PoseRenderer, &RenderView::default())), 0.3);
    }

    #[test]
    fn keeps_only_latest_of_many_commits() {
        let world = drawer_world();
        let mut follower = SnapshotFollower::attach(&world);
        for i in 1..=3 {
            world
                .modify(|tx| tx.set_position(&PrefixedName::new("slide"), i as f64).map(|_| ()))
                .unwrap();
        }
        assert!(follower.poll());
        assert_eq!(follower.version(), 3);
        assert_eq!(
            follower.latest().state().position(&PrefixedName::new("slide")).unwrap(),
            3.0
        );
    }

    #[test]
    fn waits_for_commit_from_writer_thread() {
        let world = drawer_world();
        let mut follower = SnapshotFollower::attach(&world);
        thread::scope(|s| {
            s.spawn(|| {
                world
                    .modify(|tx| tx.set_position(&PrefixedName::new("slide"), 1.0).map(|_| ()))
                    .unwrap();
            });
            assert!(follower.wait(Duration::from_secs(5)));
        });
        assert_eq!(follower.version(), 1);
    }

    #[test]
    fn wait_times_out_without_commits() {
        let world = drawer_world();
        let mut follower = SnapshotFollower::attach(&world);
        assert!(!follower.wait(Duration::from_millis(10)));
    }
}
