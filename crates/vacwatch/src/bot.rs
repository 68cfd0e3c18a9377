//! Chat command surface.
//!
//! Every incoming message is turned into a reply string. Commands map onto
//! one store or poller operation each; a setter sent without an argument
//! prompts for the value and waits for the next plain message in that chat.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use vacwatch_hh::{escape_html, group_thousands};
use vacwatch_poller::{Poller, PollerError, PollerState, SharedFilters, SharedSeen, StartOutcome};
use vacwatch_store::{
    AREAS, Experience, FilterField, FilterStore, FilterUpdate, MIN_INTERVAL_MINUTES, StoreError,
    area_name,
};

const GREETING: &str = "<b>Привет! Я бот для мониторинга вакансий на hh.ru</b>\n\n\
Я буду автоматически проверять новые вакансии по вашим фильтрам и присылать их сюда.\n\n\
Используйте /menu для настройки фильтров\n\
Используйте /status для просмотра статистики\n\
Используйте /help для справки";

const MENU: &str = "<b>Меню настроек</b>\n\n\
/position - должность\n\
/salary - минимальная зарплата\n\
/interval - интервал проверки\n\
/area - регион\n\
/experience - опыт работы\n\
/filters - текущие фильтры\n\
/run - запустить парсер\n\
/stop - остановить парсер\n\
/clear - очистить историю вакансий";

const HELP: &str = "<b>Справка по командам</b>\n\n\
<b>Основные команды:</b>\n\
/start - Начать работу с ботом\n\
/menu - Открыть меню настроек\n\
/status - Показать текущий статус\n\
/reset - Сбросить все настройки\n\
/help - Показать эту справку\n\n\
<b>Как использовать:</b>\n\
1. Настройте фильтры через /menu\n\
2. Запустите парсер командой /run\n\
3. Получайте новые вакансии автоматически!\n\n\
<b>Настройки фильтров:</b>\n\
• Должность - ключевое слово для поиска\n\
• Зарплата - минимальная желаемая зарплата (0 - без фильтра)\n\
• Интервал - как часто проверять (мин. 5 мин)\n\
• Регион - где искать вакансии\n\
• Опыт - требуемый опыт работы\n\n\
Значение можно передать сразу: <i>/salary 150000</i>\n\
Все вакансии сохраняются, дубли не придут";

const UNKNOWN_COMMAND: &str = "Неизвестная команда. Используйте /help для списка команд.";

const NOT_UNDERSTOOD: &str = "Не понял сообщение. Используйте /menu для настройки фильтров.";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Menu,
    Help,
    Status,
    Reset,
    Run,
    Stop,
    Filters,
    Clear,
    /// Set a filter field, prompting when `value` is absent.
    Set {
        field: FilterField,
        value: Option<String>,
    },
    Unknown(String),
}

impl Command {
    /// Parse `/name[@bot] [argument]`. Returns `None` for plain text.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, arg) = match rest.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, arg.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let value = (!arg.is_empty()).then(|| arg.to_string());

        let set = |field| Command::Set { field, value };
        Some(match name.as_str() {
            "start" => Command::Start,
            "menu" => Command::Menu,
            "help" => Command::Help,
            "status" => Command::Status,
            "reset" => Command::Reset,
            "run" => Command::Run,
            "stop" => Command::Stop,
            "filters" => Command::Filters,
            "clear" => Command::Clear,
            "position" => set(FilterField::Position),
            "salary" => set(FilterField::Salary),
            "interval" => set(FilterField::Interval),
            "area" => set(FilterField::Area),
            "experience" => set(FilterField::Experience),
            _ => Command::Unknown(name),
        })
    }
}

/// Turns chat messages into store and poller operations.
pub struct CommandHandler {
    filters: SharedFilters,
    seen: SharedSeen,
    poller: Arc<Poller>,
    /// Field each chat was last prompted for.
    pending: Mutex<HashMap<i64, FilterField>>,
}

impl CommandHandler {
    pub fn new(filters: SharedFilters, seen: SharedSeen, poller: Arc<Poller>) -> Self {
        Self {
            filters,
            seen,
            poller,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one message and produce the reply.
    #[tracing::instrument(skip(self, text))]
    pub async fn handle(&self, chat_id: i64, text: &str) -> String {
        match Command::parse(text) {
            Some(command) => {
                self.pending.lock().await.remove(&chat_id);
                self.dispatch(chat_id, command).await
            }
            None => self.complete_pending(chat_id, text).await,
        }
    }

    async fn dispatch(&self, chat_id: i64, command: Command) -> String {
        match command {
            Command::Start => {
                self.register_chat(chat_id).await;
                info!(chat_id, "chat registered as destination");
                GREETING.to_string()
            }
            Command::Menu => MENU.to_string(),
            Command::Help => HELP.to_string(),
            Command::Status => self.status().await,
            Command::Reset => {
                self.poller.stop().await;
                let mut filters = self.filters.lock().await;
                filters.reset().await;
                set_logged(&mut filters, FilterUpdate::Destination(Some(chat_id))).await;
                "<b>Настройки сброшены к значениям по умолчанию</b>\n\n\
                 Используйте /menu для новой настройки."
                    .to_string()
            }
            Command::Run => self.run(chat_id).await,
            Command::Stop => {
                if self.poller.stop().await {
                    "<b>Парсер остановлен</b>\n\nДля повторного запуска используйте /run."
                        .to_string()
                } else {
                    "Парсер не был запущен.".to_string()
                }
            }
            Command::Filters => {
                let summary = self.filters.lock().await.summary();
                format!("<b>Текущие фильтры:</b>\n\n{}", escape_html(&summary))
            }
            Command::Clear => {
                self.seen.lock().await.clear().await;
                "<b>История просмотренных вакансий очищена</b>\n\n\
                 Теперь все вакансии будут приходить заново."
                    .to_string()
            }
            Command::Set {
                field,
                value: Some(value),
            } => match self.apply(field, &value).await {
                Ok(reply) => reply,
                Err(e) => invalid_input(&e),
            },
            Command::Set { field, value: None } => {
                self.pending.lock().await.insert(chat_id, field);
                prompt(field)
            }
            Command::Unknown(name) => {
                warn!(chat_id, command = %name, "unknown command");
                UNKNOWN_COMMAND.to_string()
            }
        }
    }

    async fn complete_pending(&self, chat_id: i64, text: &str) -> String {
        let Some(field) = self.pending.lock().await.get(&chat_id).copied() else {
            return NOT_UNDERSTOOD.to_string();
        };

        match self.apply(field, text).await {
            Ok(reply) => {
                self.pending.lock().await.remove(&chat_id);
                reply
            }
            Err(e) => format!("{} Попробуйте еще раз:", invalid_input(&e)),
        }
    }

    async fn apply(&self, field: FilterField, raw: &str) -> Result<String, StoreError> {
        let update = FilterUpdate::parse(field, raw)?;
        let reply = confirmation(&update);
        self.filters.lock().await.set(update).await?;
        Ok(reply)
    }

    async fn run(&self, chat_id: i64) -> String {
        {
            let mut filters = self.filters.lock().await;
            if filters.filters().chat_id.is_none() {
                set_logged(&mut filters, FilterUpdate::Destination(Some(chat_id))).await;
            }
        }

        match self.poller.start().await {
            Ok(StartOutcome::Started) => "<b>Парсер запущен!</b>\n\n\
                 Новые вакансии будут приходить автоматически.\n\
                 Используйте /status для проверки состояния."
                .to_string(),
            Ok(StartOutcome::AlreadyRunning) => "Парсер уже работает.".to_string(),
            Err(PollerError::MissingPosition) => {
                "Сначала установите должность: /position".to_string()
            }
        }
    }

    async fn register_chat(&self, chat_id: i64) {
        let mut filters = self.filters.lock().await;
        set_logged(&mut filters, FilterUpdate::Destination(Some(chat_id))).await;
    }

    async fn status(&self) -> String {
        let state = match self.poller.state() {
            PollerState::Running => "Работает",
            PollerState::Cancelling => "Останавливается",
            PollerState::Stopped => "Остановлен",
        };
        let summary = self.filters.lock().await.summary();
        let seen = self.seen.lock().await.count();
        let stats = self.poller.stats().await;
        let last_cycle = stats
            .last_cycle_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "еще не было".to_string());

        format!(
            "<b>Статус системы</b>\n\n\
             Парсер: {state}\n\
             {}\n\
             Просмотрено вакансий: {seen}\n\
             Отправлено: {}, ошибок: {}\n\
             Последняя проверка: {last_cycle}",
            escape_html(&summary),
            stats.delivered,
            stats.failed_deliveries,
        )
    }
}

async fn set_logged(filters: &mut FilterStore, update: FilterUpdate) {
    if let Err(e) = filters.set(update).await {
        warn!(error = %e, "filter update rejected");
    }
}

fn prompt(field: FilterField) -> String {
    match field {
        FilterField::Position => "<b>Установка должности</b>\n\n\
             Введите название должности для поиска:\n\
             Например: <i>Python разработчик</i>, <i>Frontend developer</i>, <i>Data analyst</i>"
            .to_string(),
        FilterField::Salary => "<b>Установка минимальной зарплаты</b>\n\n\
             Введите минимальную желаемую зарплату (только число, 0 - без фильтра):\n\
             Например: <i>100000</i>, <i>150000</i>, <i>200000</i>"
            .to_string(),
        FilterField::Interval => format!(
            "<b>Установка интервала проверки</b>\n\n\
             Введите интервал проверки в минутах (минимум {MIN_INTERVAL_MINUTES}):\n\
             Например: <i>10</i>, <i>15</i>, <i>30</i>\n\n\
             Слишком частые проверки могут привести к блокировке API"
        ),
        FilterField::Area => {
            let areas: String = AREAS
                .iter()
                .map(|(id, name)| format!("• {id} - {name}\n"))
                .collect();
            format!(
                "<b>Установка региона</b>\n\n\
                 Введите ID региона:\n{areas}\n\
                 Например: <i>1</i> или <i>113</i>"
            )
        }
        FilterField::Experience => {
            let levels: String = Experience::ALL
                .iter()
                .map(|e| format!("• {} - {}\n", e.code(), e.label()))
                .collect();
            format!(
                "<b>Установка опыта работы</b>\n\n\
                 Введите код уровня опыта:\n{levels}• any - любой опыт"
            )
        }
    }
}

fn confirmation(update: &FilterUpdate) -> String {
    match update {
        FilterUpdate::Position(position) => {
            format!("<b>Должность установлена:</b> {}", escape_html(position.trim()))
        }
        FilterUpdate::Salary(0) => "<b>Фильтр по зарплате отключен</b>".to_string(),
        FilterUpdate::Salary(salary) => format!(
            "<b>Минимальная зарплата установлена:</b> {} руб.",
            group_thousands(*salary)
        ),
        FilterUpdate::IntervalMinutes(minutes) => {
            format!("<b>Интервал установлен:</b> {minutes} минут")
        }
        FilterUpdate::Area(area_id) => {
            let name = area_name(*area_id).unwrap_or("Неизвестно");
            format!("<b>Регион установлен:</b> {name} (ID {area_id})")
        }
        FilterUpdate::Experience(Some(experience)) => {
            format!("<b>Опыт установлен:</b> {}", experience.label())
        }
        FilterUpdate::Experience(None) => "<b>Опыт установлен:</b> любой".to_string(),
        FilterUpdate::Enabled(_) | FilterUpdate::Destination(_) => "Готово.".to_string(),
    }
}

fn invalid_input(error: &StoreError) -> String {
    match error {
        StoreError::PositionTooShort { min } => {
            format!("Название должности слишком короткое (минимум {min} символа).")
        }
        StoreError::InvalidInterval { min, .. } => format!("Минимальный интервал - {min} минут."),
        StoreError::InvalidNumber(_) => "Пожалуйста, введите корректное число.".to_string(),
        StoreError::UnknownArea(area_id) => {
            let known: Vec<String> = AREAS.iter().map(|(id, _)| id.to_string()).collect();
            format!(
                "Неизвестный регион: {area_id}. Доступные: {}.",
                known.join(", ")
            )
        }
        StoreError::UnknownExperience(_) => {
            let codes: Vec<&str> = Experience::ALL.iter().map(|e| e.code()).collect();
            format!(
                "Неизвестный уровень опыта. Варианты: {}, any.",
                codes.join(", ")
            )
        }
        other => format!("Не удалось сохранить настройку: {}", escape_html(&other.to_string())),
    }
}
