use std::collections::HashMap;

/// Number of live containers using each display string.
#[derive(Debug, Default)]
pub struct NameCounts {
    counts: HashMap<String, usize>,
}

impl NameCounts {
    /// Adds one user of `name` and returns the new count.
    pub fn acquire(&mut self, name: &str) -> usize {
        let count = self.counts.entry(name.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops one user of `name`; the entry disappears with its last user.
    pub fn release(&mut self, name: &str) {
        if let Some(count) = self.counts.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(name);
            }
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Number of distinct names in use.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcounting() {
        let mut names = NameCounts::default();
        assert_eq!(names.acquire("web"), 1);
        assert_eq!(names.acquire("web"), 2);
        assert_eq!(names.acquire("db"), 1);
        assert_eq!(names.len(), 2);

        names.release("web");
        assert_eq!(names.count("web"), 1);
        names.release("web");
        assert_eq!(names.count("web"), 0);
        assert_eq!(names.len(), 1);

        // releasing an unknown name is a no-op
        names.release("cache");
        assert_eq!(names.len(), 1);
    }
}
