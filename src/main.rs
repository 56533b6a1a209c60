use dotenv::dotenv;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::types::{ChatAction, InputFile, ParseMode};
use teloxide::{prelude::*, utils::command::BotCommands};

mod card;
mod chef;
mod config;
mod error;
mod gemini;
mod kitchen;
mod recipe;
mod youtube;

use card::{VideoSection, MESSAGE_LIMIT};
use chef::{Chef, DishImage};
use config::Config;
use kitchen::Kitchen;
use recipe::RandomRecipe;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type MealDialogue = Dialogue<State, InMemStorage<State>>;

/// Numbers each recipe shown so late asset results can be matched to it.
static SERVINGS: AtomicU64 = AtomicU64::new(0);

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Say hello.")]
    Start,
    #[command(description = "Display this text.")]
    Help,
    #[command(description = "Get a random meal.")]
    Meal,
}

/// What the chat currently shows. A request in flight is tracked by
/// [`Kitchen`] instead, so it can be checked and claimed atomically.
#[derive(Clone, Default)]
pub enum State {
    #[default]
    Idle,
    Served {
        serving: u64,
        recipe: RandomRecipe,
    },
}

#[tokio::main]
async fn main() {
    // Load all env variables from .env file.
    dotenv().ok();
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    log::info!("Starting bot...");

    let chef = match Config::from_env().and_then(|config| Chef::new(&config)) {
        Ok(chef) => chef,
        Err(e) => {
            log::error!("Failed to set up the Gemini client: {}", e);
            std::process::exit(1);
        }
    };

    let bot = Bot::from_env();

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(dptree::case![Command::Start].endpoint(start))
                .branch(dptree::case![Command::Help].endpoint(help))
                .branch(dptree::case![Command::Meal].endpoint(meal)),
        )
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| q.data.as_deref() == Some(card::GET_MEAL))
                .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                .endpoint(meal_button),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            Arc::new(chef),
            Arc::new(Kitchen::default()),
            InMemStorage::<State>::new()
        ])
        // Updates run concurrently so a second tap can see the first one in flight.
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn start(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, card::GREETING)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(card::get_meal_keyboard())
        .await?;
    Ok(())
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
    Ok(())
}

async fn meal(
    bot: Bot,
    dialogue: MealDialogue,
    chef: Arc<Chef>,
    kitchen: Arc<Kitchen>,
) -> HandlerResult {
    serve_meal(bot, dialogue, chef, kitchen).await
}

async fn meal_button(
    bot: Bot,
    dialogue: MealDialogue,
    chef: Arc<Chef>,
    kitchen: Arc<Kitchen>,
    q: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    serve_meal(bot, dialogue, chef, kitchen).await
}

async fn serve_meal(
    bot: Bot,
    dialogue: MealDialogue,
    chef: Arc<Chef>,
    kitchen: Arc<Kitchen>,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let Some(_ticket) = kitchen.begin(chat_id) else {
        bot.send_message(chat_id, card::STILL_PREPARING).await?;
        return Ok(());
    };

    // The previous card is gone as soon as a new meal is requested.
    dialogue.update(State::Idle).await?;
    let loading = bot.send_message(chat_id, card::LOADING).await?;

    let state = state_after(&chef.get_random_meal().await, &SERVINGS);
    dialogue.update(state.clone()).await?;
    let State::Served { serving, recipe } = state else {
        bot.edit_message_text(chat_id, loading.id, card::ERROR_BANNER)
            .reply_markup(card::get_meal_keyboard())
            .await?;
        return Ok(());
    };
    log::debug!("Serving #{} in chat {}: {:?}", serving, chat_id.0, recipe.name);

    bot.delete_message(chat_id, loading.id).await?;
    for part in card::split_message(&card::recipe_card(&recipe), MESSAGE_LIMIT) {
        bot.send_message(chat_id, part)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
    }

    tokio::spawn(async move {
        if let Err(e) = deliver_assets(bot, dialogue, chef, recipe, serving).await {
            log::error!("Failed to deliver assets for serving #{}: {}", serving, e);
        }
    });
    Ok(())
}

/// The chat state once the recipe request has settled.
fn state_after(result: &error::Result<RandomRecipe>, servings: &AtomicU64) -> State {
    match result {
        Ok(recipe) => State::Served {
            serving: servings.fetch_add(1, Ordering::Relaxed) + 1,
            recipe: recipe.clone(),
        },
        Err(_) => State::Idle,
    }
}

/// Sends the dish photo and the video section once both are ready, unless
/// the chat has moved on to another recipe in the meantime.
async fn deliver_assets(
    bot: Bot,
    dialogue: MealDialogue,
    chef: Arc<Chef>,
    recipe: RandomRecipe,
    serving: u64,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let status = match bot.send_message(chat_id, card::ASSETS_LOADING).await {
        Ok(status) => Some(status),
        Err(e) => {
            log::warn!("Failed to send the asset placeholder: {}", e);
            None
        }
    };
    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::UploadPhoto).await {
        log::warn!("Failed to send the upload action: {}", e);
    }

    let assets = chef.load_assets(&recipe).await;

    if let Some(status) = status {
        if let Err(e) = bot.delete_message(chat_id, status.id).await {
            log::warn!("Failed to delete the asset placeholder: {}", e);
        }
    }
    if !is_serving(&dialogue.get().await?, serving) {
        log::debug!("Discarding assets of stale serving #{}", serving);
        return Ok(());
    }

    let video = VideoSection::new(&recipe, assets.video_id());
    let photo = match assets.image {
        DishImage::Generated(image) => {
            InputFile::memory(image.bytes).file_name(card::photo_file_name(&image.mime_type))
        }
        DishImage::Placeholder(url) => InputFile::url(url),
    };
    if let Err(e) = bot
        .send_photo(chat_id, photo)
        .caption(card::photo_caption(&recipe))
        .parse_mode(ParseMode::MarkdownV2)
        .await
    {
        log::warn!("Failed to send the photo of {:?}: {}", recipe.name, e);
    }

    bot.send_message(chat_id, video.text())
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(video.keyboard())
        .await?;
    Ok(())
}

fn is_serving(state: &Option<State>, serving: u64) -> bool {
    matches!(state, Some(State::Served { serving: current, .. }) if *current == serving)
}
