//! 容忍中毒的加锁
//!
//! 持锁线程 panic 后互斥锁会中毒。指示器循环不能因此整体崩溃，
//! 这里记录警告后直接取回内部数据继续运行。

use std::sync::{Mutex, MutexGuard};

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_normal() {
        let mutex = Mutex::new(1);
        *lock(&mutex) += 1;
        assert_eq!(*lock(&mutex), 2);
    }

    #[test]
    fn test_poisoned_lock_recovery() {
        let mutex = Arc::new(Mutex::new(7));
        let clone = Arc::clone(&mutex);

        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert!(mutex.is_poisoned());
        assert_eq!(*lock(&mutex), 7);
    }
}
