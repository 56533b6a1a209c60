use std::sync::LazyLock;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

static PLACEHOLDER_IMAGE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://placehold.co/600x400/png").expect("Invalid placeholder image url")
});
static YOUTUBE_SEARCH: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://www.youtube.com/results").expect("Invalid YouTube search url")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub ingredient: String,
    pub measure: String,
}

/// A recipe in TheMealDB shape, as returned by the recipe model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomRecipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "strMeal")]
    pub name: String,
    #[serde(rename = "strCategory", default)]
    pub category: String,
    #[serde(rename = "strArea", default)]
    pub area: String,
    #[serde(rename = "strInstructions", default)]
    pub instructions: String,
    #[serde(rename = "strTags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(rename = "youtubeQuery", default)]
    pub youtube_query: String,
}

impl RandomRecipe {
    pub fn tags(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn youtube_search_url(&self) -> Url {
        let query = if self.youtube_query.trim().is_empty() {
            format!("{} recipe", self.name)
        } else {
            self.youtube_query.clone()
        };
        let mut url = YOUTUBE_SEARCH.clone();
        url.query_pairs_mut().append_pair("search_query", &query);
        url
    }

    pub fn placeholder_image_url(&self) -> Url {
        let mut url = PLACEHOLDER_IMAGE.clone();
        url.query_pairs_mut().append_pair("text", &self.name);
        url
    }
}

/// Response schema handed to Gemini for the recipe call.
pub fn recipe_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "strMeal": {"type": "STRING", "description": "Name of the meal"},
            "strCategory": {
                "type": "STRING",
                "description": "Category of the meal (e.g., Dessert, Beef, Chicken)"
            },
            "strArea": {
                "type": "STRING",
                "description": "Origin area of the meal (e.g., Canadian, Italian)"
            },
            "strInstructions": {
                "type": "STRING",
                "description": "Comprehensive cooking instructions"
            },
            "strTags": {
                "type": "STRING",
                "description": "Comma separated tags (e.g., Sweet, Snack)"
            },
            "ingredients": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "ingredient": {"type": "STRING"},
                        "measure": {"type": "STRING"}
                    },
                    "required": ["ingredient", "measure"]
                },
                "description": "List of ingredients and their measurements"
            },
            "youtubeQuery": {
                "type": "STRING",
                "description": "Search query string to find a video of this recipe on YouTube"
            }
        },
        "required": [
            "strMeal",
            "strCategory",
            "strArea",
            "strInstructions",
            "ingredients",
            "youtubeQuery"
        ]
    })
}

#[cfg(test)]
pub(crate) fn sample() -> RandomRecipe {
    RandomRecipe {
        id: None,
        name: "Pad Thai".to_string(),
        category: "Noodles".to_string(),
        area: "Thai".to_string(),
        instructions: "Soak the noodles.\nFry everything.".to_string(),
        tags: Some("Street Food, Spicy,".to_string()),
        ingredients: vec![
            Ingredient {
                ingredient: "Rice noodles".to_string(),
                measure: "200g".to_string(),
            },
            Ingredient {
                ingredient: "Tamarind paste".to_string(),
                measure: "2 tbsp".to_string(),
            },
        ],
        youtube_query: "authentic pad thai recipe".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_output() {
        let recipe: RandomRecipe = serde_json::from_value(json!({
            "strMeal": "Poutine",
            "strCategory": "Side",
            "strArea": "Canadian",
            "strInstructions": "Fry. Top. Pour gravy.",
            "ingredients": [{"ingredient": "Cheese curds", "measure": "1 cup"}],
            "youtubeQuery": "poutine recipe",
            "strMealThumb": "https://www.themealdb.com/images/media/meals/poutine.jpg"
        }))
        .unwrap();
        assert_eq!(recipe.name, "Poutine");
        assert_eq!(recipe.area, "Canadian");
        assert_eq!(recipe.tags, None);
        assert!(recipe.tags().is_empty());
        assert_eq!(recipe.ingredients[0].measure, "1 cup");
    }

    #[test]
    fn optional_fields_may_be_missing() {
        let recipe: RandomRecipe = serde_json::from_value(json!({"strMeal": "Soup"})).unwrap();
        assert_eq!(recipe.category, "");
        assert!(recipe.ingredients.is_empty());
    }

    #[test]
    fn name_is_required() {
        let parsed = serde_json::from_value::<RandomRecipe>(json!({"strCategory": "Soup"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(sample().tags(), vec!["Street Food", "Spicy"]);
    }

    #[test]
    fn search_url_prefers_query_and_falls_back_to_name() {
        let recipe = sample();
        assert_eq!(
            recipe.youtube_search_url().as_str(),
            "https://www.youtube.com/results?search_query=authentic+pad+thai+recipe"
        );

        let blank = RandomRecipe {
            youtube_query: "  ".to_string(),
            ..sample()
        };
        assert_eq!(
            blank.youtube_search_url().as_str(),
            "https://www.youtube.com/results?search_query=Pad+Thai+recipe"
        );
    }

    #[test]
    fn placeholder_encodes_the_name() {
        let recipe = RandomRecipe {
            name: "Fish & Chips".to_string(),
            ..sample()
        };
        assert_eq!(
            recipe.placeholder_image_url().as_str(),
            "https://placehold.co/600x400/png?text=Fish+%26+Chips"
        );
    }

    #[test]
    fn schema_requires_core_fields() {
        let schema = recipe_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"strMeal"));
        assert!(required.contains(&"youtubeQuery"));
        assert!(!required.contains(&"strTags"));
        assert_eq!(schema["properties"]["ingredients"]["type"], "ARRAY");
    }
}
