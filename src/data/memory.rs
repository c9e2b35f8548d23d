//! Process-local storage with the same semantics as the MongoDB backend.
//!
//! Selected with `storage: memory`; everything is lost on restart.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::data::activity::db::ActivityDb;
use crate::data::activity::ActivityLog;
use crate::data::class::db::{ClassDb, ClassQuery, EnrollOutcome};
use crate::data::class::Class;
use crate::data::notification::db::NotificationDb;
use crate::data::notification::Notification;
use crate::data::resource::db::ResourceRequestDb;
use crate::data::resource::{RequestStatus, ResourceRequest};
use crate::data::schedule::db::{ScheduleDb, ScheduleQuery};
use crate::data::schedule::ClassSchedule;
use crate::data::user::db::UserDb;
use crate::data::user::{AccountStatus, AdminAllowList, User};
use crate::error::StoreError;
use crate::role::Role;

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    schedules: HashMap<Uuid, ClassSchedule>,
    classes: HashMap<Uuid, Class>,
    // Insertion order doubles as creation order.
    notifications: Vec<Notification>,
    activity: Vec<ActivityLog>,
    resource_requests: Vec<ResourceRequest>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    admins: AdminAllowList,
}

impl MemoryBackend {
    pub fn new(admins: AdminAllowList) -> MemoryBackend {
        MemoryBackend {
            state: RwLock::new(State::default()),
            admins,
        }
    }

    /// Every notification, oldest first, regardless of recipient.
    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn all_schedules(&self) -> Vec<ClassSchedule> {
        let mut rows: Vec<_> = self.state.read().await.schedules.values().cloned().collect();
        rows.sort_by_key(|it| it.created_at);
        rows
    }
}

#[rocket::async_trait]
impl UserDb for MemoryBackend {
    async fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        self.admins.enforce(&mut user);

        let mut state = self.state.write().await;
        if state.users.values().any(|it| it.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_account_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.users.get_mut(&id).map(|user| {
            if !self.admins.contains(&user.email) {
                user.account_status = status;
            }
            user.clone()
        }))
    }

    async fn set_resource_access(
        &self,
        id: Uuid,
        access: bool,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.users.get_mut(&id).map(|user| {
            if !self.admins.contains(&user.email) {
                user.resource_access = access;
            }
            user.clone()
        }))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|it| it.email == email)
            .cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|it| role.map_or(true, |role| it.role == role))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn set_assigned_teacher(
        &self,
        student: Uuid,
        teacher: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .users
            .get_mut(&student)
            .and_then(|it| it.assigned_teacher.replace(teacher)))
    }

    async fn add_assigned_student(&self, teacher: Uuid, student: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(teacher) = state.users.get_mut(&teacher) {
            if !teacher.assigned_students.contains(&student) {
                teacher.assigned_students.push(student);
            }
        }
        Ok(())
    }

    async fn remove_assigned_student(
        &self,
        teacher: Uuid,
        student: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(teacher) = state.users.get_mut(&teacher) {
            teacher.assigned_students.retain(|it| *it != student);
        }
        Ok(())
    }

    async fn increment_classes_taken(&self, student: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(student) = state.users.get_mut(&student) {
            student.total_classes_taken += 1;
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl ScheduleDb for MemoryBackend {
    async fn insert_schedule(&self, schedule: ClassSchedule) -> Result<ClassSchedule, StoreError> {
        self.state
            .write()
            .await
            .schedules
            .insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Option<ClassSchedule>, StoreError> {
        Ok(self.state.read().await.schedules.get(&id).cloned())
    }

    async fn save_schedule(&self, schedule: ClassSchedule) -> Result<ClassSchedule, StoreError> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.schedules.get_mut(&schedule.id) {
            *stored = schedule.clone();
        }
        Ok(schedule)
    }

    async fn list_schedules(&self, query: &ScheduleQuery) -> Result<Vec<ClassSchedule>, StoreError> {
        let mut rows: Vec<ClassSchedule> = self
            .state
            .read()
            .await
            .schedules
            .values()
            .filter(|it| query.matches(it))
            .cloned()
            .collect();
        rows.sort_by_key(|it| it.scheduled_date);

        let rows = rows.into_iter().skip(query.skip as usize);
        Ok(match query.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }
}

#[rocket::async_trait]
impl ClassDb for MemoryBackend {
    async fn insert_class(&self, class: Class) -> Result<Class, StoreError> {
        let mut state = self.state.write().await;
        if state.classes.values().any(|it| it.room_id == class.room_id) {
            return Err(StoreError::Duplicate("room_id"));
        }
        state.classes.insert(class.id, class.clone());
        Ok(class)
    }

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, StoreError> {
        Ok(self.state.read().await.classes.get(&id).cloned())
    }

    async fn save_class(&self, class: Class) -> Result<Class, StoreError> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.classes.get_mut(&class.id) {
            *stored = class.clone();
        }
        Ok(class)
    }

    async fn list_classes(&self, query: &ClassQuery) -> Result<Vec<Class>, StoreError> {
        let mut classes: Vec<Class> = self
            .state
            .read()
            .await
            .classes
            .values()
            .filter(|it| query.matches(it))
            .cloned()
            .collect();
        classes.sort_by_key(|it| it.scheduled_time);
        Ok(classes)
    }

    async fn enroll_student(&self, class: Uuid, student: Uuid) -> Result<EnrollOutcome, StoreError> {
        let mut state = self.state.write().await;
        match state.classes.get_mut(&class) {
            Some(c) if c.status.is_open() && !c.is_enrolled(student) && !c.is_full() => {
                c.enrolled_students.push(student);
                Ok(EnrollOutcome::Enrolled(c.clone()))
            }
            other => Ok(EnrollOutcome::classify(other.map(|it| it.clone()), student)),
        }
    }
}

#[rocket::async_trait]
impl NotificationDb for MemoryBackend {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification, StoreError> {
        self.state
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user: Uuid, limit: u32) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .notifications
            .iter()
            .rev()
            .filter(|it| it.user_id == user)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_unread(&self, user: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .notifications
            .iter()
            .filter(|it| it.user_id == user && !it.read)
            .count() as u64)
    }

    async fn mark_read(&self, user: Uuid, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .notifications
            .iter_mut()
            .find(|it| it.id == id && it.user_id == user)
            .map(|it| {
                it.read = true;
                it.clone()
            }))
    }

    async fn mark_all_read(&self, user: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut modified = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|it| it.user_id == user && !it.read)
        {
            notification.read = true;
            modified += 1;
        }
        Ok(modified)
    }

    async fn clear_read(&self, user: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state
            .notifications
            .retain(|it| !(it.user_id == user && it.read));
        Ok((before - state.notifications.len()) as u64)
    }
}

#[rocket::async_trait]
impl ActivityDb for MemoryBackend {
    async fn insert_activity(&self, entry: ActivityLog) -> Result<ActivityLog, StoreError> {
        self.state.write().await.activity.push(entry.clone());
        Ok(entry)
    }

    async fn list_activity(&self, user: Uuid, limit: u32) -> Result<Vec<ActivityLog>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .activity
            .iter()
            .rev()
            .filter(|it| it.user_id == user)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[rocket::async_trait]
impl ResourceRequestDb for MemoryBackend {
    async fn insert_resource_request(&self, request: ResourceRequest) -> Result<ResourceRequest, StoreError> {
        let mut state = self.state.write().await;
        if request.status == RequestStatus::Pending
            && state
                .resource_requests
                .iter()
                .any(|it| it.user_id == request.user_id && it.status == RequestStatus::Pending)
        {
            return Err(StoreError::Duplicate("pending resource request"));
        }
        state.resource_requests.push(request.clone());
        Ok(request)
    }

    async fn get_resource_request(&self, id: Uuid) -> Result<Option<ResourceRequest>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .resource_requests
            .iter()
            .find(|it| it.id == id)
            .cloned())
    }

    async fn find_pending_request(&self, user: Uuid) -> Result<Option<ResourceRequest>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .resource_requests
            .iter()
            .find(|it| it.user_id == user && it.status == RequestStatus::Pending)
            .cloned())
    }

    async fn save_resource_request(&self, request: ResourceRequest) -> Result<ResourceRequest, StoreError> {
        let mut state = self.state.write().await;
        if let Some(stored) = state
            .resource_requests
            .iter_mut()
            .find(|it| it.id == request.id)
        {
            *stored = request.clone();
        }
        Ok(request)
    }

    async fn list_resource_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ResourceRequest>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .resource_requests
            .iter()
            .filter(|it| status.map_or(true, |status| it.status == status))
            .cloned()
            .collect())
    }
}
