//! Recording fakes for the OS services.

use super::context::ExecutionContext;
use super::services::{InputDriver, Point, ScreenSearch, Services};
use crate::settings::{ImageQuery, MouseButton};
use enigo::Key;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Click(i32, i32),
    Keys(Vec<Key>),
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    searches: usize,
    fail_clicks: bool,
    fail_searches: bool,
    /// Results handed out in order; the last one repeats.
    screen: VecDeque<Option<Point>>,
}

#[derive(Clone, Default)]
pub struct FakeServices {
    shared: Arc<Mutex<Shared>>,
}

struct FakeInput(Arc<Mutex<Shared>>);
struct FakeScreen(Arc<Mutex<Shared>>);

impl FakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> Services {
        Services::new(
            Box::new(FakeInput(self.shared.clone())),
            Box::new(FakeScreen(self.shared.clone())),
        )
    }

    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.services())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn searches(&self) -> usize {
        self.shared.lock().unwrap().searches
    }

    pub fn fail_clicks(&self) {
        self.shared.lock().unwrap().fail_clicks = true;
    }

    pub fn fail_searches(&self) {
        self.shared.lock().unwrap().fail_searches = true;
    }

    pub fn set_screen(&self, results: Vec<Option<Point>>) {
        self.shared.lock().unwrap().screen = results.into();
    }
}

impl InputDriver for FakeInput {
    fn click(&mut self, x: i32, y: i32, _button: MouseButton, count: u32) -> anyhow::Result<()> {
        let mut shared = self.0.lock().unwrap();
        for _ in 0..count {
            shared.calls.push(Call::Click(x, y));
        }
        if shared.fail_clicks {
            anyhow::bail!("click rejected");
        }
        Ok(())
    }

    fn press_keys(&mut self, keys: &[Key]) -> anyhow::Result<()> {
        self.0.lock().unwrap().calls.push(Call::Keys(keys.to_vec()));
        Ok(())
    }
}

impl ScreenSearch for FakeScreen {
    fn find_image(&mut self, _query: &ImageQuery) -> anyhow::Result<Option<Point>> {
        let mut shared = self.0.lock().unwrap();
        shared.searches += 1;
        if shared.fail_searches {
            anyhow::bail!("capture failed");
        }
        let result = if shared.screen.len() > 1 {
            shared.screen.pop_front().flatten()
        } else {
            shared.screen.front().copied().flatten()
        };
        Ok(result)
    }
}
