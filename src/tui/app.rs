/// Key returned when the user quits the menu
pub const QUIT_KEY: &str = "-1";
/// Key of the "go to parent directory" entry
pub const PARENT_KEY: &str = "..";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub key: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    pub fn quit() -> Self {
        Self::new(QUIT_KEY, "Quit")
    }

    pub fn is_quit(&self) -> bool {
        self.key == QUIT_KEY
    }
}

/// State of the filterable list
pub struct SelectorApp {
    pub prompt: String,
    pub filter: String,
    options: Vec<SelectOption>,
    /// Indices into `options` matching the filter, plus the quit entry last
    filtered: Vec<usize>,
    pub selected: usize,
    pub scroll_offset: usize,
    pub should_quit: bool,
    pub chosen: Option<SelectOption>,
}

impl SelectorApp {
    pub fn new(prompt: impl Into<String>, mut options: Vec<SelectOption>) -> Self {
        options.retain(|o| !o.is_quit());
        options.push(SelectOption::quit());

        let mut app = Self {
            prompt: prompt.into(),
            filter: String::new(),
            options,
            filtered: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            should_quit: false,
            chosen: None,
        };
        app.apply_filter();
        app
    }

    fn apply_filter(&mut self) {
        let needle = self.filter.to_lowercase();
        self.filtered = self
            .options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_quit() || o.label.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn visible(&self) -> impl Iterator<Item = &SelectOption> {
        self.filtered.iter().map(|&i| &self.options[i])
    }

    pub fn visible_len(&self) -> usize {
        self.filtered.len()
    }

    /// Number of real matches (the quit entry is always listed)
    pub fn match_count(&self) -> usize {
        self.filtered.len().saturating_sub(1)
    }

    pub fn push_char(&mut self, c: char) {
        self.filter.push(c);
        self.apply_filter();
    }

    pub fn pop_char(&mut self) {
        if self.filter.pop().is_some() {
            self.apply_filter();
        }
    }

    pub fn select_next(&mut self, page: usize) {
        if self.selected + 1 < self.filtered.len() {
            self.selected += 1;
        }
        if page > 0 && self.selected >= self.scroll_offset + page {
            self.scroll_offset = self.selected + 1 - page;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        }
    }

    pub fn selected_option(&self) -> Option<&SelectOption> {
        self.filtered.get(self.selected).map(|&i| &self.options[i])
    }

    pub fn confirm(&mut self) {
        self.chosen = self.selected_option().cloned();
        self.should_quit = true;
    }

    pub fn cancel(&mut self) {
        self.chosen = Some(SelectOption::quit());
        self.should_quit = true;
    }

    /// Outcome once the loop has finished
    pub fn into_choice(self) -> SelectOption {
        self.chosen.unwrap_or_else(SelectOption::quit)
    }
}
