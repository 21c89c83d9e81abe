use base64::{engine::general_purpose::STANDARD, Engine as _};

/// The one rule set every provider is prompted with.
/// Productivity means "matches the stated task", never a site allow-list.
pub const TASK_MATCHING_RULES: &str = "\
The user is ONLY on task if what they are doing directly matches their stated task.
- Said \"answer emails\" and on Gmail -> on task.
- Said \"learn Java\" and on a Java tutorial -> on task.
- Said \"answer emails\" and on Khan Academy -> off task, even though it is educational.
- Said \"learn math\" and on Instagram -> off task.
Social media and entertainment sites are almost never on task.
Educational content only counts when it matches the task topic.
Vague relevance does not count.";

/// A captured image of the visible tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Screenshot {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            media_type: "image/png".to_string(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Everything a classifier needs for one verdict, rendered per provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub task: String,
    pub title: String,
    pub url: String,
    pub screenshot: Option<Screenshot>,
}

impl ClassificationRequest {
    pub fn new(task: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            title: title.into(),
            url: url.into(),
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: Option<Screenshot>) -> Self {
        self.screenshot = screenshot;
        self
    }

    fn page_block(&self) -> String {
        format!(
            "The user said they are working on: \"{}\"\n\nTheir current browser tab shows:\n- Title: \"{}\"\n- URL: {}",
            self.task, self.title, self.url
        )
    }

    /// Prompt answered with exactly `ON_TASK` or `OFF_TASK`.
    /// `with_screenshot` adds the hint that an image is attached.
    pub fn task_token_prompt(&self, with_screenshot: bool) -> String {
        let screenshot_hint = if with_screenshot {
            "\n\nA screenshot of the visible tab is attached; use what is actually on screen."
        } else {
            ""
        };
        format!(
            "You are a productivity monitor. {}{}\n\n{}\n\nRespond with only \"ON_TASK\" or \"OFF_TASK\".",
            self.page_block(),
            screenshot_hint,
            TASK_MATCHING_RULES
        )
    }

    /// Prompt for the conversational agent, answered with `PRODUCTIVE` or `UNPRODUCTIVE`.
    /// The rules live in the agent's memory blocks, so only the page is sent.
    pub fn agent_prompt(&self) -> String {
        let task = if self.task.is_empty() { "Not specified" } else { self.task.as_str() };
        format!(
            "Analyze if this website matches my stated task:\n\nMY STATED TASK: {}\nWEBSITE TITLE: {}\nWEBSITE URL: {}\n\n\
             Decision criteria: does this website help me complete my stated task?\n\n\
             Respond with ONLY \"PRODUCTIVE\" or \"UNPRODUCTIVE\" - no other text.",
            task, self.title, self.url
        )
    }

    /// Follow-up prompt for a one-sentence reason shown next to the badge.
    pub fn justification_prompt(&self, on_task: bool) -> String {
        let verdict = if on_task { "ON_TASK" } else { "OFF_TASK" };
        format!(
            "{}\n\nThis tab was judged {}. In one short sentence (under 20 words), tell the user why. \
             Do not repeat the verdict token.",
            self.page_block(),
            verdict
        )
    }
}
