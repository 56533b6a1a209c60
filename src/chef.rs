//! The three Gemini calls behind a meal: the recipe, its photo and a
//! tutorial video.

use reqwest::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gemini::{
    GeminiClient, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineImage,
    Tool,
};
use crate::recipe::{recipe_schema, RandomRecipe};
use crate::youtube;

const RECIPE_PROMPT: &str = "Generate a random, delicious, and authentic recipe from any cuisine in the world.
It should be a real, established dish.
Provide the details in the specified JSON format.";

const RECIPE_SYSTEM_INSTRUCTION: &str =
    "You are a culinary API that acts like TheMealDB. Return a single random recipe.";

pub struct Chef {
    gemini: GeminiClient,
    recipe_model: String,
    image_model: String,
    video_model: String,
    temperature: f32,
}

/// What to show as the dish photo.
#[derive(Debug, Clone, PartialEq)]
pub enum DishImage {
    Generated(InlineImage),
    Placeholder(Url),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DishAssets {
    pub image: DishImage,
    pub video_url: Option<String>,
}

impl DishAssets {
    pub fn video_id(&self) -> Option<&str> {
        self.video_url.as_deref().and_then(youtube::video_id)
    }
}

impl Chef {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Chef {
            gemini: GeminiClient::new(config)?,
            recipe_model: config.recipe_model.clone(),
            image_model: config.image_model.clone(),
            video_model: config.video_model.clone(),
            temperature: config.temperature,
        })
    }

    pub async fn get_random_meal(&self) -> Result<RandomRecipe> {
        let request = GenerateContentRequest::prompt(RECIPE_PROMPT)
            .system_instruction(RECIPE_SYSTEM_INSTRUCTION)
            .generation_config(GenerationConfig {
                temperature: Some(self.temperature),
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(recipe_schema()),
            });

        let recipe = self
            .gemini
            .generate_content(&self.recipe_model, &request)
            .await
            .and_then(|response| {
                let text = response
                    .text()
                    .ok_or(Error::EmptyResponse("no recipe text"))?;
                parse_recipe(&text)
            });
        match &recipe {
            Ok(recipe) => log::info!("Generated recipe {:?}", recipe.name),
            Err(e) => log::error!("Error generating recipe: {}", e),
        }
        recipe
    }

    /// A generated photo of the dish, `None` on any failure.
    pub async fn generate_dish_image(&self, title: &str) -> Option<InlineImage> {
        let request = GenerateContentRequest::prompt(image_prompt(title));
        match self.gemini.generate_content(&self.image_model, &request).await {
            Ok(response) => {
                let image = response.inline_images().into_iter().next();
                if image.is_none() {
                    log::warn!("Image model returned no inline image for {:?}", title);
                }
                image
            }
            Err(e) => {
                log::error!("Error generating image: {}", e);
                None
            }
        }
    }

    /// A YouTube tutorial link found through Google Search grounding.
    pub async fn get_recipe_video(&self, name: &str) -> Option<String> {
        let request = GenerateContentRequest::prompt(format!(
            "Find a YouTube video tutorial for making {}.",
            name
        ))
        .tool(Tool::GoogleSearch {});

        match self.gemini.generate_content(&self.video_model, &request).await {
            Ok(response) => {
                let video = pick_video(&response);
                match &video {
                    Some(url) => log::debug!("Found video for {:?}: {}", name, url),
                    None => log::warn!("No YouTube video found for {:?}", name),
                }
                video
            }
            Err(e) => {
                log::error!("Error finding video: {}", e);
                None
            }
        }
    }

    /// Fetches the photo and the video concurrently.
    pub async fn load_assets(&self, recipe: &RandomRecipe) -> DishAssets {
        let (image, video_url) = tokio::join!(
            self.generate_dish_image(&recipe.name),
            self.get_recipe_video(&recipe.name)
        );
        DishAssets {
            image: match image {
                Some(image) => DishImage::Generated(image),
                None => DishImage::Placeholder(recipe.placeholder_image_url()),
            },
            video_url,
        }
    }
}

fn image_prompt(title: &str) -> String {
    format!(
        "A professional, appetizing food photography shot of {}. High resolution, centered, culinary magazine style.",
        title
    )
}

/// The first grounding source on a YouTube host, else the first YouTube
/// link in the answer text.
pub fn pick_video(response: &GenerateContentResponse) -> Option<String> {
    response
        .grounding_uris()
        .into_iter()
        .find(|uri| youtube::is_youtube_url(uri))
        .map(str::to_string)
        .or_else(|| {
            response
                .text()
                .and_then(|text| youtube::find_link(&text).map(str::to_string))
        })
}

/// Parses the recipe JSON, tolerating a markdown code fence around it.
pub fn parse_recipe(text: &str) -> Result<RandomRecipe> {
    Ok(serde_json::from_str(strip_code_fence(text))?)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(fenced) = trimmed.strip_prefix("```") {
        if let (Some(start), Some(end)) = (fenced.find('\n'), fenced.rfind("```")) {
            if start < end {
                return fenced[start + 1..end].trim();
            }
        }
    }
    trimmed
}
