use crate::WindowId;

/// Source of window identifiers. Called once per window lifetime.
pub trait IdGenerator {
    fn next_id(&mut self) -> WindowId;
}

impl<F> IdGenerator for F
where
    F: FnMut() -> WindowId,
{
    fn next_id(&mut self) -> WindowId {
        (self)()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> WindowId {
        new_id()
    }
}

/// 64 random bits; a reload draws a fresh id and its old record ages out.
pub fn new_id() -> WindowId {
    WindowId(rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_ids_do_not_repeat() {
        let mut ids = RandomIds;
        let seen: HashSet<WindowId> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn closures_generate_ids() {
        let mut next = 0u64;
        let mut ids = move || {
            next += 1;
            WindowId(next)
        };
        assert_eq!(IdGenerator::next_id(&mut ids), WindowId(1));
        assert_eq!(IdGenerator::next_id(&mut ids), WindowId(2));
    }
}
