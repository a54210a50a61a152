//! Domain services.
//!
//! Each service owns a [`Store`] handle and performs one mutation per call:
//! authorize, validate, persist, then record the activity and notifications.

mod activity;
mod attendance;
mod auth;
mod chat;
mod comments;
mod leave;
mod notifications;
mod notify;
mod projects;
mod tasks;
mod users;

pub use activity::{ActivityRecorder, ActivityView};
pub use attendance::{
    AttendanceQuery, AttendanceService, AttendanceSummary, AttendanceUpdate, BreakInput,
    CheckInput,
};
pub use auth::{AuthService, AuthSession, LoginInput, PasswordChange, ProfileUpdate, RegisterInput};
pub use chat::{ChatInput, ChatRead, ChatService, ChatView, MessageInput, ReactionInput};
pub use comments::{CommentInput, CommentService, CommentView};
pub use leave::{LeaveDecision, LeaveInput, LeaveQuery, LeaveService};
pub use notifications::{BroadcastInput, Inbox, InboxQuery, MarkedRead, NotificationService};
pub use notify::Notifier;
pub use projects::{
    MemberInput, ProjectDetail, ProjectInput, ProjectQuery, ProjectService, ProjectUpdate,
    TaskStats,
};
pub use tasks::{TaskInput, TaskQuery, TaskService, TaskUpdate, TaskView};
pub use users::{UserQuery, UserService, UserUpdate};

use crate::auth::TokenService;
use crate::store::Store;

/// All services wired to one store.
#[derive(Clone)]
pub struct Services {
    pub store: Store,
    pub activities: ActivityRecorder,
    pub auth: AuthService,
    pub users: UserService,
    pub tasks: TaskService,
    pub comments: CommentService,
    pub projects: ProjectService,
    pub attendance: AttendanceService,
    pub leave: LeaveService,
    pub notifications: NotificationService,
    pub chat: ChatService,
}

impl Services {
    pub fn new(store: Store, tokens: TokenService) -> Self {
        let recorder = ActivityRecorder::new(store.clone());
        let notifier = Notifier::new(store.clone());
        Self {
            auth: AuthService::new(store.clone(), recorder.clone(), tokens),
            users: UserService::new(store.clone(), recorder.clone()),
            tasks: TaskService::new(store.clone(), recorder.clone(), notifier.clone()),
            comments: CommentService::new(store.clone(), recorder.clone(), notifier.clone()),
            projects: ProjectService::new(store.clone(), recorder.clone(), notifier.clone()),
            attendance: AttendanceService::new(store.clone(), recorder.clone()),
            leave: LeaveService::new(store.clone(), recorder.clone(), notifier.clone()),
            notifications: NotificationService::new(store.clone(), recorder.clone()),
            chat: ChatService::new(store.clone(), recorder.clone(), notifier),
            activities: recorder,
            store,
        }
    }
}
