use std::cell::{Cell, RefCell};

use chrono::{DateTime, Duration, TimeZone, Utc};
use taskboard_core::backend::Backend;
use taskboard_core::cache::{CacheValue, FetchOutcome, QueryKey};
use taskboard_core::clock::ManualClock;
use taskboard_core::error::{BackendError, MutationError};
use taskboard_core::model::{
    Author, Comment, CommentId, CommentTree, NewComment, NewTask, Priority, Project,
    ProjectDetail, ProjectInput, ProjectSummary, ReactionAction, ReactionAggregate, SortOrder,
    Task, TaskDetail, TaskPatch, TaskStatus, ToggleReactionResponse, User,
};
use taskboard_core::mutation::{
    CreateComment, CreateReply, MutationExecutor, Outcome, RecordingNotifier, ToggleReaction,
    UpdateTask,
};

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBackend {
    comments: RefCell<CommentTree>,
    task: RefCell<Option<TaskDetail>>,
    calls: RefCell<Vec<&'static str>>,
    fail_with: RefCell<Option<BackendError>>,
    panic_on_write: Cell<bool>,
    next_id: Cell<u32>,
}

impl FakeBackend {
    fn failing(err: BackendError) -> Self {
        let backend = Self::default();
        *backend.fail_with.borrow_mut() = Some(err);
        backend
    }

    fn writes(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| !c.starts_with("list") && !c.starts_with("get"))
            .count()
    }

    fn write(&self, name: &'static str) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(name);
        assert!(!self.panic_on_write.get(), "connection pool poisoned");
        match self.fail_with.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

fn ada() -> User {
    User {
        id: "u1".into(),
        name: "Ada".into(),
        email: "ada@example.com".into(),
    }
}

fn server_comment(id: &str, minutes: i64, content: &str) -> Comment {
    let at = t0() + Duration::minutes(minutes);
    Comment {
        id: CommentId::persisted(id),
        content: content.into(),
        user: Author::from(&ada()),
        user_id: "u1".into(),
        task_id: "t1".into(),
        parent_id: None,
        created_at: at,
        updated_at: at,
        reactions: Vec::new(),
        replies: Vec::new(),
    }
}

fn server_task() -> TaskDetail {
    TaskDetail {
        task: Task {
            id: "t1".into(),
            title: "Write docs".into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date: None,
            project_id: "p1".into(),
            user_id: "u1".into(),
            created_at: t0(),
            updated_at: t0(),
        },
        project: ProjectSummary {
            id: "p1".into(),
            name: "Docs".into(),
        },
    }
}

impl Backend for FakeBackend {
    fn current_user(&self) -> Result<User, BackendError> {
        Ok(ada())
    }

    fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        Ok(Vec::new())
    }

    fn get_project(&self, _: &str) -> Result<ProjectDetail, BackendError> {
        Err(BackendError::NotFound("Project not found".into()))
    }

    fn create_project(&self, _: &ProjectInput) -> Result<Project, BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn update_project(&self, _: &str, _: &ProjectInput) -> Result<Project, BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn delete_project(&self, _: &str) -> Result<(), BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn list_tasks(&self, _: &str) -> Result<Vec<Task>, BackendError> {
        Ok(Vec::new())
    }

    fn get_task(&self, _: &str, _: &str) -> Result<TaskDetail, BackendError> {
        self.calls.borrow_mut().push("get_task");
        self.task
            .borrow()
            .clone()
            .ok_or_else(|| BackendError::NotFound("Task not found".into()))
    }

    fn create_task(&self, _: &str, _: &NewTask) -> Result<Task, BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn update_task(&self, _: &str, _: &str, patch: &TaskPatch) -> Result<Task, BackendError> {
        self.write("update_task")?;
        let mut slot = self.task.borrow_mut();
        let detail = slot.get_or_insert_with(server_task);
        patch.apply_to(&mut detail.task);
        Ok(detail.task.clone())
    }

    fn delete_task(&self, _: &str, _: &str) -> Result<(), BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn list_comments(
        &self,
        _: &str,
        _: &str,
        sort: SortOrder,
    ) -> Result<CommentTree, BackendError> {
        self.calls.borrow_mut().push("list_comments");
        let mut tree = self.comments.borrow().clone();
        tree.sort_by(|a, b| match sort {
            SortOrder::Asc => a.created_at.cmp(&b.created_at),
            SortOrder::Desc => b.created_at.cmp(&a.created_at),
        });
        Ok(tree)
    }

    fn create_comment(
        &self,
        _: &str,
        _: &str,
        comment: &NewComment,
    ) -> Result<Comment, BackendError> {
        self.write("create_comment")?;
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let mut created = server_comment(&format!("s{n}"), 60 + i64::from(n), &comment.content);
        created.parent_id.clone_from(&comment.parent_id);
        let mut comments = self.comments.borrow_mut();
        match &comment.parent_id {
            Some(parent) => {
                let Some(top) = comments
                    .iter_mut()
                    .find(|c| c.id.as_persisted() == Some(parent.as_str()))
                else {
                    return Err(BackendError::NotFound("Comment not found".into()));
                };
                top.replies.insert(0, created.clone());
            }
            None => comments.push(created.clone()),
        }
        Ok(created)
    }

    fn update_comment(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Comment, BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn delete_comment(&self, _: &str, _: &str, _: &str) -> Result<(), BackendError> {
        Err(BackendError::BadRequest("unsupported".into()))
    }

    fn toggle_reaction(
        &self,
        _: &str,
        _: &str,
        comment_id: &str,
        emoji: &str,
    ) -> Result<ToggleReactionResponse, BackendError> {
        self.write("toggle_reaction")?;
        let mut comments = self.comments.borrow_mut();
        let Some(target) = comments
            .iter_mut()
            .find(|c| c.id.as_persisted() == Some(comment_id))
        else {
            return Err(BackendError::NotFound("Comment not found".into()));
        };
        let action = if let Some(pos) = target.reactions.iter().position(|r| r.emoji == emoji) {
            target.reactions.remove(pos);
            ReactionAction::Removed
        } else {
            target.reactions.push(ReactionAggregate {
                emoji: emoji.into(),
                count: 1,
                user_reacted: true,
            });
            ReactionAction::Added
        };
        Ok(ToggleReactionResponse { action })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn executor() -> MutationExecutor<RecordingNotifier, ManualClock> {
    let mut exec = MutationExecutor::new()
        .with_notifier(RecordingNotifier::default())
        .with_clock(ManualClock::ticking(t0() + Duration::hours(1), Duration::seconds(1)));
    exec.sign_in(ada());
    exec
}

fn desc_key() -> QueryKey {
    QueryKey::comments("p1", "t1", SortOrder::Desc)
}

fn create(content: &str) -> CreateComment {
    CreateComment {
        project_id: "p1".into(),
        task_id: "t1".into(),
        sort: SortOrder::Desc,
        content: content.into(),
    }
}

fn toggle(comment: &str, emoji: &str) -> ToggleReaction {
    ToggleReaction {
        project_id: "p1".into(),
        task_id: "t1".into(),
        sort: SortOrder::Desc,
        comment_id: CommentId::persisted(comment),
        emoji: emoji.into(),
    }
}

fn seeded() -> (FakeBackend, MutationExecutor<RecordingNotifier, ManualClock>) {
    let backend = FakeBackend::default();
    backend.comments.borrow_mut().extend([
        server_comment("c1", 0, "first"),
        server_comment("c2", 5, "second"),
    ]);
    let mut exec = executor();
    exec.read(&backend, &desc_key()).unwrap();
    (backend, exec)
}

fn cached_tree(exec: &MutationExecutor<RecordingNotifier, ManualClock>) -> CommentTree {
    exec.cache()
        .get(&desc_key())
        .and_then(CacheValue::as_comments)
        .cloned()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn optimistic_comment_is_visible_before_dispatch() {
    let (backend, mut exec) = seeded();

    let in_flight = exec.begin(create("  hello  ")).unwrap().unwrap();
    let tree = cached_tree(&exec);
    assert_eq!(tree.len(), 3);
    assert!(tree[0].id.is_pending(), "newest first in desc order");
    assert_eq!(tree[0].content, "hello");
    assert_eq!(tree[0].user.name, "Ada");
    assert_eq!(backend.writes(), 0);

    let created = exec.settle(in_flight.dispatch(&backend)).unwrap();
    assert_eq!(created.content, "hello");
    assert_eq!(backend.writes(), 1);
}

#[test]
fn commit_invalidates_and_refetch_replaces_pending_ids() {
    let (backend, mut exec) = seeded();

    let outcome = exec.execute(&backend, create("hello")).unwrap();
    assert!(matches!(outcome, Outcome::Committed(_)));
    assert!(exec.cache().is_invalidated(&desc_key()));

    assert_eq!(exec.refetch_stale(&backend), 1);
    let tree = cached_tree(&exec);
    assert_eq!(tree.len(), 3);
    assert!(tree.iter().all(|c| !c.id.is_pending()));
    assert!(!exec.cache().is_invalidated(&desc_key()));
}

#[test]
fn failure_restores_snapshot_and_notifies_once() {
    let backend = FakeBackend::failing(BackendError::Server {
        status: 500,
        message: "boom".into(),
    });
    backend.comments.borrow_mut().push(server_comment("c1", 0, "first"));
    let mut exec = executor();
    exec.read(&backend, &desc_key()).unwrap();
    let before = exec.cache().get(&desc_key()).cloned();

    let err = exec.execute(&backend, create("hello")).unwrap_err();

    assert!(matches!(
        err,
        MutationError::RolledBack {
            message: "Failed to create comment",
            ..
        }
    ));
    assert_eq!(exec.cache().get(&desc_key()).cloned(), before);
    assert!(!exec.cache().is_invalidated(&desc_key()));
    let errors: Vec<_> = exec.notifier().errors().map(|n| n.message.clone()).collect();
    assert_eq!(errors, vec!["Failed to create comment".to_string()]);
    assert_eq!(backend.writes(), 1, "no automatic retry");
}

#[test]
fn failure_without_prior_cache_removes_optimistic_entry() {
    let backend = FakeBackend::failing(BackendError::Unauthorized);
    let mut exec = executor();

    let err = exec.execute(&backend, create("hello")).unwrap_err();
    assert_eq!(err.code(), taskboard_core::error::ErrorCode::MutationRolledBack);
    assert!(exec.cache().get(&desc_key()).is_none());
}

#[test]
fn blank_content_is_a_silent_no_op() {
    let (backend, mut exec) = seeded();
    let before = cached_tree(&exec);

    let outcome = exec.execute(&backend, create("   \n ")).unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(cached_tree(&exec), before);
    assert_eq!(backend.writes(), 0);
    assert!(exec.notifier().notices().is_empty());
    assert_eq!(exec.cache().latest_seq(&desc_key()), 0);
}

#[test]
fn signed_out_mutation_is_rejected_without_side_effects() {
    let backend = FakeBackend::default();
    let mut exec = executor();
    exec.sign_out();

    let err = exec.execute(&backend, create("hello")).unwrap_err();
    assert_eq!(err, MutationError::Unauthenticated);
    assert_eq!(backend.writes(), 0);
    assert!(exec.cache().is_empty());
}

fn reply(parent: CommentId, content: &str) -> CreateReply {
    CreateReply {
        project_id: "p1".into(),
        task_id: "t1".into(),
        sort: SortOrder::Desc,
        parent_id: parent,
        content: content.into(),
    }
}

#[test]
fn replies_are_prepended_newest_first() {
    let (backend, mut exec) = seeded();

    let hi = exec.begin(reply(CommentId::persisted("c1"), "hi")).unwrap().unwrap();
    let there = exec.begin(reply(CommentId::persisted("c1"), "there")).unwrap().unwrap();

    let tree = cached_tree(&exec);
    let c1 = tree.iter().find(|c| c.id == CommentId::persisted("c1")).unwrap();
    let contents: Vec<_> = c1.replies.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, ["there", "hi"]);
    assert_eq!(c1.replies[0].parent_id.as_deref(), Some("c1"));

    exec.settle(hi.dispatch(&backend)).unwrap();
    exec.settle(there.dispatch(&backend)).unwrap();
    exec.refetch_stale(&backend);

    let tree = cached_tree(&exec);
    let c1 = tree.iter().find(|c| c.id == CommentId::persisted("c1")).unwrap();
    let contents: Vec<_> = c1.replies.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, ["there", "hi"]);
    assert!(c1.replies.iter().all(|r| !r.id.is_pending()));
}

#[test]
fn pending_comments_cannot_be_replied_to_or_reacted_on() {
    let (backend, mut exec) = seeded();
    let in_flight = exec.begin(create("draft")).unwrap().unwrap();
    let pending_id = cached_tree(&exec)[0].id.clone();
    assert!(pending_id.is_pending());
    let before = cached_tree(&exec);

    let err = exec.begin(reply(pending_id.clone(), "nested")).unwrap_err();
    assert_eq!(err, MutationError::PendingTarget(pending_id.clone()));

    let err = exec
        .begin(ToggleReaction {
            comment_id: pending_id,
            ..toggle("c1", "👍")
        })
        .unwrap_err();
    assert!(matches!(err, MutationError::PendingTarget(_)));
    assert_eq!(cached_tree(&exec), before);

    exec.settle(in_flight.dispatch(&backend)).unwrap();
}

#[test]
fn reaction_toggle_matches_server_after_refetch() {
    let (backend, mut exec) = seeded();

    let response = exec
        .execute(&backend, toggle("c1", "👍"))
        .unwrap()
        .committed()
        .unwrap();
    assert_eq!(response.action, ReactionAction::Added);

    let optimistic = cached_tree(&exec);
    exec.refetch_stale(&backend);
    assert_eq!(cached_tree(&exec), optimistic, "prediction equals server state");
}

#[test]
fn blank_emoji_is_invalid() {
    let (backend, mut exec) = seeded();
    let err = exec.execute(&backend, toggle("c1", "  ")).unwrap_err();
    assert!(matches!(err, MutationError::Invalid(_)));
    assert_eq!(backend.writes(), 0);
}

#[test]
fn overlapping_mutations_invalidate_after_the_last_settles() {
    let (backend, mut exec) = seeded();

    let first = exec.begin(toggle("c1", "👍")).unwrap().unwrap();
    let second = exec.begin(toggle("c2", "🎉")).unwrap().unwrap();
    assert_eq!(second.seq(), first.seq() + 1);
    assert_eq!(
        second.snapshot().and_then(CacheValue::as_comments).map(|t| t
            .iter()
            .find(|c| c.id == CommentId::persisted("c1"))
            .map(|c| c.reactions.len())),
        Some(Some(1)),
        "second snapshot is taken after the first optimistic write"
    );

    // Responses arrive out of order.
    let second_done = second.dispatch(&backend);
    exec.settle(second_done).unwrap();
    assert!(!exec.cache().is_invalidated(&desc_key()));
    assert_eq!(exec.refetch_stale(&backend), 0);

    exec.settle(first.dispatch(&backend)).unwrap();
    assert!(exec.cache().is_invalidated(&desc_key()));
    assert_eq!(exec.refetch_stale(&backend), 1);

    let tree = cached_tree(&exec);
    let c1 = tree.iter().find(|c| c.id == CommentId::persisted("c1")).unwrap();
    let c2 = tree.iter().find(|c| c.id == CommentId::persisted("c2")).unwrap();
    assert_eq!(c1.reactions[0].emoji, "👍");
    assert_eq!(c2.reactions[0].emoji, "🎉");
}

#[test]
fn overlapping_failures_settled_in_order_refetch_server_state() {
    let (backend, mut exec) = seeded();
    let before = cached_tree(&exec);
    let boom = || BackendError::Server {
        status: 500,
        message: "boom".into(),
    };

    let first = exec.begin(create("rejected A")).unwrap().unwrap();
    let second = exec.begin(create("rejected B")).unwrap().unwrap();

    exec.settle(first.resolve(Err(boom()))).unwrap_err();
    assert!(!exec.cache().is_invalidated(&desc_key()), "second mutation still pending");

    // The second snapshot was taken after the first optimistic write.
    exec.settle(second.resolve(Err(boom()))).unwrap_err();
    assert_eq!(exec.cache().in_flight(&desc_key()), 0);
    assert!(exec.cache().is_invalidated(&desc_key()));

    assert_eq!(exec.refetch_stale(&backend), 1);
    let tree = cached_tree(&exec);
    assert_eq!(tree, before);
    assert!(tree.iter().all(|c| !c.id.is_pending()));
    assert_eq!(backend.writes(), 0);
    assert_eq!(exec.notifier().errors().count(), 2);
}

#[test]
fn fetch_started_before_a_mutation_is_discarded() {
    let (backend, mut exec) = seeded();

    let ticket = exec.begin_fetch(&desc_key());
    let stale_response =
        CacheValue::Comments(backend.list_comments("p1", "t1", SortOrder::Desc).unwrap());

    let in_flight = exec.begin(create("hello")).unwrap().unwrap();
    assert_eq!(exec.complete_fetch(ticket, stale_response), FetchOutcome::Discarded);
    assert!(cached_tree(&exec)[0].id.is_pending(), "optimistic state survives");

    exec.settle(in_flight.dispatch(&backend)).unwrap();
}

#[test]
fn read_returns_optimistic_value_while_in_flight() {
    let (backend, mut exec) = seeded();
    exec.execute(&backend, create("first write")).unwrap();
    let in_flight = exec.begin(create("second write")).unwrap().unwrap();

    let tree = exec
        .read_comments(&backend, "p1", "t1", SortOrder::Desc)
        .unwrap();
    assert!(tree[0].id.is_pending());

    exec.settle(in_flight.dispatch(&backend)).unwrap();
    let tree = exec
        .read_comments(&backend, "p1", "t1", SortOrder::Desc)
        .unwrap();
    assert_eq!(tree.len(), 4);
    assert!(tree.iter().all(|c| !c.id.is_pending()));
}

#[test]
fn sort_orders_are_cached_separately() {
    let (backend, mut exec) = seeded();
    let asc = exec.read_comments(&backend, "p1", "t1", SortOrder::Asc).unwrap();
    let desc = exec.read_comments(&backend, "p1", "t1", SortOrder::Desc).unwrap();
    assert_eq!(asc[0].id, CommentId::persisted("c1"));
    assert_eq!(desc[0].id, CommentId::persisted("c2"));

    exec.execute(&backend, create("hello")).unwrap();
    assert!(exec.cache().is_invalidated(&desc_key()));
    assert!(!exec
        .cache()
        .is_invalidated(&QueryKey::comments("p1", "t1", SortOrder::Asc)));
}

#[test]
fn update_task_without_cache_still_sends() {
    let backend = FakeBackend::default();
    let mut exec = executor();

    let patch = TaskPatch {
        status: Some(TaskStatus::Done),
        ..TaskPatch::default()
    };
    let task = exec
        .execute(&backend, UpdateTask::new("p1", "t1", patch))
        .unwrap()
        .committed()
        .unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert!(exec.cache().get(&QueryKey::task("p1", "t1")).is_none());
}

#[test]
fn update_task_merges_present_fields_and_rolls_back() {
    let backend = FakeBackend::default();
    *backend.task.borrow_mut() = Some(server_task());
    let mut exec = executor();
    let before = exec.read_task(&backend, "p1", "t1").unwrap();

    let patch = TaskPatch {
        priority: Some(Priority::Urgent),
        ..TaskPatch::default()
    };
    let in_flight = exec.begin(UpdateTask::new("p1", "t1", patch)).unwrap().unwrap();
    let optimistic = exec.read_task(&backend, "p1", "t1").unwrap();
    assert_eq!(optimistic.task.priority, Priority::Urgent);
    assert_eq!(optimistic.task.title, before.task.title);

    let failed = in_flight.resolve(Err(BackendError::NotFound("Task not found".into())));
    let err = exec.settle(failed).unwrap_err();
    assert!(matches!(
        err,
        MutationError::RolledBack {
            message: "Failed to update task",
            source: BackendError::NotFound(_),
        }
    ));
    assert_eq!(exec.read_task(&backend, "p1", "t1").unwrap(), before);
}

#[test]
fn update_task_rejects_blank_title_and_skips_empty_patch() {
    let backend = FakeBackend::default();
    let mut exec = executor();

    let blank = TaskPatch {
        title: Some("   ".into()),
        ..TaskPatch::default()
    };
    assert!(matches!(
        exec.execute(&backend, UpdateTask::new("p1", "t1", blank)),
        Err(MutationError::Invalid(_))
    ));
    assert_eq!(
        exec.execute(&backend, UpdateTask::new("p1", "t1", TaskPatch::default()))
            .unwrap(),
        Outcome::Skipped
    );
    assert_eq!(backend.writes(), 0);
}

#[test]
fn panicking_backend_still_rolls_back() {
    let (backend, mut exec) = seeded();
    backend.panic_on_write.set(true);
    let before = cached_tree(&exec);

    let err = exec.execute(&backend, toggle("c1", "👍")).unwrap_err();
    match err {
        MutationError::RolledBack { message, source } => {
            assert_eq!(message, "Failed to toggle reaction");
            assert!(source.to_string().contains("connection pool poisoned"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(cached_tree(&exec), before);
    assert_eq!(exec.notifier().errors().count(), 1);
}

#[test]
fn switching_users_drops_cached_views() {
    let (_backend, mut exec) = seeded();
    assert!(!exec.cache().is_empty());

    exec.sign_in(ada());
    assert!(!exec.cache().is_empty(), "same user keeps the cache");

    exec.sign_in(User {
        id: "u2".into(),
        name: "Grace".into(),
        email: "grace@example.com".into(),
    });
    assert!(exec.cache().is_empty());
}
