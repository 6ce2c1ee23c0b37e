use futures::future::join_all;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::generation::TextGenerator;

pub const DEFAULT_POST_PROMPT: &str = "Write a post that encourages thoughtful engagement and \
reflection on how we consciously interact with technology. Leverage the perspective of a parent \
who studied neuroscience and business, has travelled the world and works in the cleantech \
sector: an open-minded, avid reader with interesting takes on why people act the way they do, \
optimistic and cultured. Make the connections this person would make and use their perspective.";

/// Platform families with their own post format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Long-form narrative post.
    LinkedIn,
    /// Numbered thread of short posts.
    Twitter,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::LinkedIn, Platform::Twitter];

    pub fn slug(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::LinkedIn => f.write_str("LinkedIn"),
            Platform::Twitter => f.write_str("Twitter"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Platform::LinkedIn),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(format!("unknown platform: {} (use linkedin or twitter)", other)),
        }
    }
}

fn bulleted(excerpts: &[String]) -> String {
    excerpts
        .iter()
        .map(|e| format!("- {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full instruction for one platform with every excerpt embedded verbatim.
pub fn build_post_prompt(prompt: &str, excerpts: &[String], platform: Platform) -> String {
    let excerpts_text = bulleted(excerpts);
    match platform {
        Platform::LinkedIn => format!(
            r#"{prompt}
Write a LinkedIn-style post and follow these guidelines:

1. Objective & Audience:
- Your audience includes professionals, parents, educators, and individuals navigating the digital world.
- Provide content that resonates emotionally and intellectually, offering valuable insights rather than simply aiming for virality.

2. Source Integration:
- You are given a set of pre-selected excerpts at the end of this prompt.
- Seamlessly incorporate several of these excerpts into your post. Each excerpt should retain context and clearly explain its relevance.
- You may paraphrase the excerpts but maintain their core meaning.
- Use these excerpts to add credibility, spark thought, and anchor your message in real data or human experiences.
- Blend them well within the post so that the content stays homogeneous, cohesive and engaging.

3. Format & Structure:
- Begin with a compelling statement or statistic to grab attention.
- Follow with a short anecdote or relatable scenario to humanize the topic.
- Keep paragraphs short and easily readable.
- Use emojis sparingly to highlight key points or add warmth.

4. Content & Tone:
- Inspire readers to think more deeply about their digital behaviors and encourage positive action.
- Suggest practical steps or considerations (e.g., encouraging open dialogue, setting guidelines, or being mindful of online interactions).
- Maintain a conversational, empathetic tone suitable for a professional but relatable platform.

5. Engagement & Interaction:
- Conclude with a clear call-to-action, such as asking a question or inviting readers to share their own experiences.
- Mention that if additional resources or links are available, they will be placed in the comments (do not include external links directly).
- Given the overall post, write the most attention-grabbing headline and put it on top of the post.

6. Hashtags:
- Add up to five relevant hashtags at the end (e.g., #DigitalWellbeing, #OnlineSafety, #TechEthics, #MentalHealth, #ConsciousTech).

Excerpts:
{excerpts_text}"#,
            prompt = prompt.trim(),
            excerpts_text = excerpts_text
        ),
        Platform::Twitter => format!(
            r#"Write a Twitter thread: {prompt}
Follow these guidelines:

1. Structure:
- Number every tweet as "1/", "2/", "3/" and so on, one tweet per paragraph.
- Keep every tweet under 280 characters, including its number.
- Write between 5 and 10 tweets.

2. Hook:
- The first tweet must stand on its own and make readers want to open the thread, ideally with a striking statistic or question.

3. Source Integration:
- Build the thread on the pre-selected excerpts listed at the end of this prompt.
- Each excerpt you use must keep its context and say where the information comes from.
- You may paraphrase but must keep the core meaning.

4. Tone:
- Conversational, clear and empathetic. No jargon.
- Use emojis sparingly.

5. Closing:
- End with a tweet that invites replies or asks readers to share their experience.
- Add at most two relevant hashtags, only in the last tweet.

Excerpts:
{excerpts_text}"#,
            prompt = prompt.trim(),
            excerpts_text = excerpts_text
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub platform: Platform,
    pub text: String,
}

/// One generation round. After a draft is chosen the others are gone and
/// the chosen one is freely editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSet {
    drafts: Vec<Draft>,
    chosen: Option<usize>,
}

impl DraftSet {
    pub fn new(drafts: Vec<Draft>) -> Self {
        Self {
            drafts,
            chosen: None,
        }
    }

    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Index the chosen draft had in the original round.
    pub fn chosen_index(&self) -> Option<usize> {
        self.chosen
    }

    pub fn selected(&self) -> Option<&Draft> {
        self.chosen.and(self.drafts.first())
    }

    /// Keeps only draft `index`. Choosing the same index again is a no-op.
    pub fn choose(&mut self, index: usize) -> Result<&Draft> {
        match self.chosen {
            Some(chosen) if chosen == index => {}
            Some(chosen) => return Err(PipelineError::DraftAlreadyChosen { chosen }),
            None => {
                if index >= self.drafts.len() {
                    return Err(PipelineError::DraftIndexOutOfRange {
                        index,
                        len: self.drafts.len(),
                    });
                }
                let keep = self.drafts.swap_remove(index);
                self.drafts = vec![keep];
                self.chosen = Some(index);
            }
        }
        self.selected().ok_or(PipelineError::NoDraftSelected)
    }

    pub fn edit(&mut self, text: impl Into<String>) -> Result<()> {
        if self.chosen.is_none() {
            return Err(PipelineError::NoDraftSelected);
        }
        let draft = self
            .drafts
            .first_mut()
            .ok_or(PipelineError::NoDraftSelected)?;
        draft.text = text.into();
        Ok(())
    }
}

pub struct DraftGenerator {
    generator: Arc<dyn TextGenerator>,
    max_versions: usize,
}

impl DraftGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_versions: usize) -> Self {
        Self {
            generator,
            max_versions,
        }
    }

    /// Issues `versions` independent calls with the same prompt. Every call is
    /// awaited; if any fails the whole round fails and no drafts are returned.
    pub async fn generate(
        &self,
        prompt: &str,
        excerpts: &[String],
        platform: Platform,
        versions: usize,
    ) -> Result<DraftSet> {
        if !(1..=self.max_versions).contains(&versions) {
            return Err(PipelineError::InvalidVersionCount {
                requested: versions,
                max: self.max_versions,
            });
        }
        if excerpts.is_empty() {
            return Err(PipelineError::EmptyExcerptList);
        }

        let full_prompt = build_post_prompt(prompt, excerpts, platform);

        let results = join_all((0..versions).map(|_| self.generator.complete(&full_prompt))).await;

        let mut drafts = Vec::with_capacity(versions);
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(text) if !text.trim().is_empty() => drafts.push(Draft {
                    platform,
                    text: text.trim().to_string(),
                }),
                Ok(_) => {
                    warn!(version = index + 1, "draft generation returned empty text");
                    return Err(PipelineError::GenerationBatchFailed(format!(
                        "version {} of {} came back empty",
                        index + 1,
                        versions
                    )));
                }
                Err(e) => {
                    warn!(version = index + 1, error = %e, "draft generation failed");
                    return Err(PipelineError::GenerationBatchFailed(format!(
                        "version {} of {}: {}",
                        index + 1,
                        versions,
                        e
                    )));
                }
            }
        }

        info!(%platform, versions, "drafts generated");
        Ok(DraftSet::new(drafts))
    }
}
