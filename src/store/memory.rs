//! In-process grade store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use time::OffsetDateTime;

use super::{GradeStore, StoreResult};
use crate::error::StoreError;
use crate::grade::{Grade, GradeChanges, GradeId, NewGrade};

#[derive(Debug)]
struct Inner {
    next_id: GradeId,
    grades: BTreeMap<GradeId, Grade>,
}

/// Grade store held entirely in memory.
#[derive(Debug)]
pub struct MemoryGradeStore {
    inner: RwLock<Inner>,
}

impl MemoryGradeStore {
    /// Create an empty store. The first id handed out is 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                grades: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryGradeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GradeStore for MemoryGradeStore {
    fn list(&self) -> StoreResult<Vec<Grade>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.grades.values().cloned().collect())
    }

    fn get(&self, id: GradeId) -> StoreResult<Option<Grade>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.grades.get(&id).cloned())
    }

    fn create(&self, grade: NewGrade) -> StoreResult<Grade> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let id = inner.next_id;
        inner.next_id += 1;

        let grade = Grade {
            id,
            student_name: grade.student_name,
            score: grade.score,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.grades.insert(id, grade.clone());
        Ok(grade)
    }

    fn update(&self, id: GradeId, changes: &GradeChanges) -> StoreResult<Option<Grade>> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.grades.get_mut(&id).map(|grade| {
            grade.apply(changes);
            grade.clone()
        }))
    }

    fn delete(&self, id: GradeId) -> StoreResult<bool> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.grades.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_grade(name: &str, score: i32) -> NewGrade {
        NewGrade {
            student_name: name.to_string(),
            score,
        }
    }

    #[test]
    fn create_then_get_returns_same_record() {
        let store = MemoryGradeStore::new();

        let created = store.create(new_grade("Bob", 90)).unwrap();
        let fetched = store.get(created.id).unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.student_name, "Bob");
        assert_eq!(fetched.score, 90);
    }

    #[test]
    fn list_is_in_creation_order() {
        let store = MemoryGradeStore::new();
        store.create(new_grade("Charlie", 88)).unwrap();
        store.create(new_grade("Alice", 85)).unwrap();
        store.create(new_grade("Bob", 90)).unwrap();

        let names: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|g| g.student_name)
            .collect();

        assert_eq!(names, vec!["Charlie", "Alice", "Bob"]);
        assert_eq!(store.scores().unwrap(), vec![88, 85, 90]);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = MemoryGradeStore::new();
        let first = store.create(new_grade("Alice", 85)).unwrap();

        assert!(store.delete(first.id).unwrap());
        let second = store.create(new_grade("Bob", 90)).unwrap();

        assert!(second.id > first.id);
        assert_eq!(store.get(first.id).unwrap(), None);
    }

    #[test]
    fn update_keeps_id_and_created_at() {
        let store = MemoryGradeStore::new();
        let created = store.create(new_grade("Charlie", 88)).unwrap();

        let updated = store
            .update(created.id, &new_grade("Charlie Updated", 92).into())
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.student_name, "Charlie Updated");
        assert_eq!(updated.score, 92);
    }

    #[test]
    fn missing_ids_report_absence() {
        let store = MemoryGradeStore::new();

        assert_eq!(store.get(42).unwrap(), None);
        assert_eq!(
            store.update(42, &GradeChanges::default()).unwrap(),
            None
        );
        assert!(!store.delete(42).unwrap());
    }
}
