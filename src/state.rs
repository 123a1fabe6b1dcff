use std::sync::Arc;

use crate::users::store::UsersStore;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UsersStore>,
}

impl AppState {
    pub fn new(users: Arc<dyn UsersStore>) -> Self {
        Self { users }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::users::memory::InMemoryUsersStore;

        Self::new(Arc::new(InMemoryUsersStore::new()) as Arc<dyn UsersStore>)
    }
}
