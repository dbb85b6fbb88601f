//! Task catalog and tier badge metadata
//!
//! The catalog is statically defined: community tasks members can complete
//! for XP, plus the badge metadata for each tier. Submissions snapshot the
//! XP value at submission time, so later catalog edits never change what a
//! queued submission is worth.

use serde::{Deserialize, Serialize};

/// Unique identifier for a catalog task
pub type TaskId = u32;

/// A community task members can complete for XP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Catalog id
    pub id: TaskId,
    /// Display title
    pub title: String,
    /// Short description
    pub description: String,
    /// Grouping category ("Social Media", "Content Creation", ...)
    pub category: String,
    /// XP credited on approval
    pub xp_reward: u64,
    /// One-time tasks accept at most one non-rejected submission per member
    pub one_time: bool,
    /// Step-by-step instructions shown to the member
    pub instructions: Vec<String>,
    /// What counts as acceptable proof
    pub proof_required: String,
}

/// Badge metadata for a tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierBadge {
    pub tier: u8,
    pub name: String,
    /// Display color (hex)
    pub color: String,
    /// Minimum XP for this tier
    pub threshold: u64,
    /// NFT metadata URI; tier 0 has no badge
    pub metadata_uri: Option<String>,
}

/// The static task catalog plus tier badges
#[derive(Debug, Clone)]
pub struct Catalog {
    tasks: Vec<Task>,
    badges: Vec<TierBadge>,
}

impl Catalog {
    pub fn new(tasks: Vec<Task>, badges: Vec<TierBadge>) -> Self {
        Self { tasks, badges }
    }

    /// The built-in community program catalog
    pub fn builtin() -> Self {
        Self::new(default_tasks(), default_badges())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Badge for a tier, falling back to tier 0
    pub fn badge(&self, tier: u8) -> &TierBadge {
        self.badges
            .iter()
            .find(|b| b.tier == tier)
            .unwrap_or(&self.badges[0])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn task(
    id: TaskId,
    title: &str,
    description: &str,
    category: &str,
    xp_reward: u64,
    one_time: bool,
    instructions: &[&str],
    proof_required: &str,
) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        xp_reward,
        one_time,
        instructions: instructions.iter().map(|s| s.to_string()).collect(),
        proof_required: proof_required.to_string(),
    }
}

fn default_tasks() -> Vec<Task> {
    vec![
        task(
            1,
            "Follow on Twitter",
            "Follow our official Twitter account and retweet our pinned post",
            "Social Media",
            50,
            true,
            &[
                "Visit our Twitter profile",
                "Click the Follow button",
                "Retweet our pinned post",
                "Take a screenshot showing you followed and retweeted",
                "Upload the screenshot as proof",
            ],
            "Screenshot of your Twitter profile showing you're following us and the retweet",
        ),
        task(
            2,
            "Write a Blog Post",
            "Write a detailed blog post about our project (minimum 500 words)",
            "Content Creation",
            150,
            false,
            &[
                "Write an article about the Identity Registry",
                "Minimum 500 words",
                "Publish on Medium, Dev.to, or your personal blog",
                "Include links to our project",
                "Submit the published article URL as proof",
            ],
            "URL of the published blog post",
        ),
        task(
            3,
            "Join Discord",
            "Join our Discord server and introduce yourself",
            "Community",
            30,
            true,
            &[
                "Join our Discord server",
                "Go to #introductions channel",
                "Post your introduction (who you are, why you're interested)",
                "Take a screenshot of your introduction message",
                "Submit the screenshot",
            ],
            "Screenshot of your Discord introduction message",
        ),
        task(
            4,
            "Create a Video Tutorial",
            "Create a video explaining how to use the registry",
            "Content Creation",
            300,
            false,
            &[
                "Record a video tutorial (3-10 minutes)",
                "Show how to connect a wallet, earn XP, and mint the identity NFT",
                "Upload to YouTube or Loom",
                "Submit the video URL",
            ],
            "YouTube or Loom video URL",
        ),
        task(
            5,
            "Report a Bug",
            "Find and report a bug in our application",
            "Development",
            100,
            false,
            &[
                "Test the application thoroughly",
                "If you find a bug, document it clearly",
                "Include steps to reproduce",
                "Take screenshots if applicable",
                "Submit a detailed bug report",
            ],
            "Detailed bug report with screenshots and steps to reproduce",
        ),
        task(
            6,
            "Refer 3 Friends",
            "Invite 3 friends to join and connect their wallets",
            "Community Growth",
            200,
            true,
            &[
                "Share your referral link with friends",
                "At least 3 friends must connect their wallets",
                "Provide their wallet addresses as proof",
                "They must confirm they joined through your referral",
            ],
            "List of 3 wallet addresses of your referrals",
        ),
        task(
            7,
            "Complete Learning Module",
            "Complete our Web3 learning module and pass the quiz",
            "Education",
            120,
            true,
            &[
                "Access the learning module (link in Discord)",
                "Complete all lessons",
                "Pass the final quiz with 80% or higher",
                "Screenshot your completion certificate",
            ],
            "Screenshot of quiz completion with score",
        ),
        task(
            8,
            "Design a Custom NFT",
            "Design a new tier badge for our NFT collection",
            "Design",
            250,
            false,
            &[
                "Create an original NFT badge design",
                "Use 500x500px dimensions",
                "Make it fit our Bronze/Silver/Gold theme",
                "Upload to Imgur or similar",
                "Submit the image URL",
            ],
            "URL to your uploaded design",
        ),
    ]
}

fn default_badges() -> Vec<TierBadge> {
    vec![
        TierBadge {
            tier: 0,
            name: "No Tier".to_string(),
            color: "#ffffff".to_string(),
            threshold: 0,
            metadata_uri: None,
        },
        TierBadge {
            tier: 1,
            name: "Bronze".to_string(),
            color: "#CD7F32".to_string(),
            threshold: 100,
            metadata_uri: Some("ipfs://QmBronzeURI".to_string()),
        },
        TierBadge {
            tier: 2,
            name: "Silver".to_string(),
            color: "#C0C0C0".to_string(),
            threshold: 500,
            metadata_uri: Some("ipfs://QmSilverURI".to_string()),
        },
        TierBadge {
            tier: 3,
            name: "Gold".to_string(),
            color: "#FFD700".to_string(),
            threshold: 1000,
            metadata_uri: Some("ipfs://QmGoldURI".to_string()),
        },
    ]
}
