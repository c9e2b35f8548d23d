use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::data::mongo::{duplicate_or, MongoBackend};
use crate::error::StoreError;

use super::{Class, ClassStatus, CLASS_COLLECTION_NAME};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreateData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub course_type: Option<String>,
    /// ISO 8601 start time.
    pub scheduled_time: Option<String>,
    pub duration: Option<u32>,
    pub max_students: Option<u32>,
    /// Teaching account; admins only, teachers always author for themselves.
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddStudentData {
    pub student_id: Option<Uuid>,
}

/// Result of an atomic enrollment attempt.
#[derive(Debug, Clone)]
pub enum EnrollOutcome {
    Enrolled(Class),
    NotFound,
    NotOpen(Class),
    AlreadyEnrolled(Class),
    Full(Class),
}

impl EnrollOutcome {
    /// Explains why an offering refused a student.
    pub fn classify(class: Option<Class>, student: Uuid) -> EnrollOutcome {
        match class {
            None => EnrollOutcome::NotFound,
            Some(c) if !c.status.is_open() => EnrollOutcome::NotOpen(c),
            Some(c) if c.is_enrolled(student) => EnrollOutcome::AlreadyEnrolled(c),
            Some(c) => EnrollOutcome::Full(c),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassQuery {
    pub teacher: Option<Uuid>,
    pub open_only: bool,
}

impl ClassQuery {
    pub fn matches(&self, class: &Class) -> bool {
        self.teacher.map_or(true, |it| class.teacher == it)
            && (!self.open_only || class.status.is_open())
    }

    fn to_document(&self) -> Document {
        let mut query = Document::new();
        if let Some(teacher) = self.teacher {
            query.insert("teacher", filter::uuid(teacher));
        }
        if self.open_only {
            query.insert(
                "status",
                doc! { "$in": [ClassStatus::Scheduled.as_str(), ClassStatus::Ongoing.as_str()] },
            );
        }
        query
    }
}

#[rocket::async_trait]
pub trait ClassDb {
    async fn insert_class(&self, class: Class) -> Result<Class, StoreError>;
    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, StoreError>;
    async fn save_class(&self, class: Class) -> Result<Class, StoreError>;
    async fn list_classes(&self, query: &ClassQuery) -> Result<Vec<Class>, StoreError>;

    /// Adds `student` to the offering only if it is open, the student isn't enrolled
    /// yet and there is a free seat, as one atomic step.
    async fn enroll_student(&self, class: Uuid, student: Uuid) -> Result<EnrollOutcome, StoreError>;
}

impl MongoBackend {
    fn classes(&self) -> Collection<Class> {
        self.database().collection(CLASS_COLLECTION_NAME)
    }
}

#[rocket::async_trait]
impl ClassDb for MongoBackend {
    async fn insert_class(&self, class: Class) -> Result<Class, StoreError> {
        self.classes()
            .insert_one(&class, None)
            .await
            .map_err(duplicate_or("room_id"))?;
        Ok(class)
    }

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, StoreError> {
        Ok(self.classes().find_one(filter::by_id(id), None).await?)
    }

    async fn save_class(&self, class: Class) -> Result<Class, StoreError> {
        self.classes()
            .replace_one(filter::by_id(class.id), &class, None)
            .await?;
        Ok(class)
    }

    async fn list_classes(&self, query: &ClassQuery) -> Result<Vec<Class>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "scheduled_time": 1 })
            .build();

        let cursor = self.classes().find(query.to_document(), options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn enroll_student(&self, class: Uuid, student: Uuid) -> Result<EnrollOutcome, StoreError> {
        let seat_available = doc! {
            "_id": filter::uuid(class),
            "status": { "$in": [ClassStatus::Scheduled.as_str(), ClassStatus::Ongoing.as_str()] },
            "enrolled_students": { "$ne": filter::uuid(student) },
            "$expr": { "$lt": [{ "$size": "$enrolled_students" }, "$max_students"] },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .classes()
            .find_one_and_update(
                seat_available,
                doc! { "$addToSet": { "enrolled_students": filter::uuid(student) } },
                options,
            )
            .await?;

        match updated {
            Some(it) => Ok(EnrollOutcome::Enrolled(it)),
            None => Ok(EnrollOutcome::classify(self.get_class(class).await?, student)),
        }
    }
}
