use crc32fast::Hasher;

pub type ShotId = String;
pub type PageId = String;
pub type GroupId = String;

/// Generate a project seed from its name using CRC32
pub fn project_seed(name: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(format!("storyboard://{}", name).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential id generator for shots, pages and sub-shot groups
///
/// Ids look like `<seed>-<kind><n>`. The counter is shared across kinds so
/// every id handed out by one generator is unique.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn new(project_name: &str) -> Self {
        Self::from_seed(project_seed(project_name))
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    pub fn shot_id(&mut self) -> ShotId {
        self.next("s")
    }

    pub fn page_id(&mut self) -> PageId {
        self.next("p")
    }

    pub fn group_id(&mut self) -> GroupId {
        self.next("g")
    }

    fn next(&mut self, kind: &str) -> String {
        self.count += 1;
        format!("{}-{}{}", self.seed, kind, self.count)
    }

    /// Advance the counter past an id loaded from disk so freshly generated
    /// ids never collide with it.
    pub fn observe(&mut self, id: &str) {
        let Some(rest) = id.strip_prefix(self.seed.as_str()).and_then(|r| r.strip_prefix('-')) else {
            return;
        };
        let digits = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        if let Ok(n) = digits.parse::<u64>() {
            self.count = self.count.max(n);
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_seed_is_stable() {
        assert_eq!(project_seed("pilot"), project_seed("pilot"));
        assert_ne!(project_seed("pilot"), project_seed("finale"));
    }

    #[test]
    fn test_ids_are_sequential_across_kinds() {
        let mut gen = IdGenerator::from_seed("abc".to_string());

        assert_eq!(gen.shot_id(), "abc-s1");
        assert_eq!(gen.page_id(), "abc-p2");
        assert_eq!(gen.group_id(), "abc-g3");
    }

    #[test]
    fn test_observe_skips_past_loaded_ids() {
        let mut gen = IdGenerator::from_seed("abc".to_string());
        gen.observe("abc-s41");
        gen.observe("abc-p7");
        gen.observe("foreign-s900");
        gen.observe("abc-weird");

        assert_eq!(gen.shot_id(), "abc-s42");
    }
}
