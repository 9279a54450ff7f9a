use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::{io::Read, path::PathBuf};
use tracing::debug;
use xmorphy::{
    opencorpora::{self, DictionaryOpenCorpora},
    resolve_data_dir,
    tokenizer::{Script, TokenType},
    Engine, Language, DICT_FILE,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Subcommand)]
enum Commands {
    /// Разбор текста из stdin: на каждый токен строка `Лемма\tТег\tВероятность`.
    Analyze,
    /// Сборка бинарного словаря из XML-словаря OpenCorpora.
    Build {
        #[clap(short, long = "dict", default_value = "dict.opcorpora.xml")]
        dictionary: PathBuf,

        /// Читать XML через буфер: медленнее, но сильно экономит память.
        #[clap(short, long, default_value_t = false)]
        reader: bool,
    },
}

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Каталог данных движка. XMORPHY_DATA_DIR перекрывает.
    #[clap(long, default_value = "data/")]
    data_dir: PathBuf,

    #[clap(short, value_enum, default_value = "russian")]
    language: Language,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let Args {
        data_dir,
        language: _,
        command,
    } = Args::parse();
    let data_dir = resolve_data_dir(&data_dir);

    match command {
        Commands::Build { dictionary, reader } => {
            let start = std::time::Instant::now();

            let dict = match reader {
                true => DictionaryOpenCorpora::init_from_path_with_reader(&dictionary)?,
                false => DictionaryOpenCorpora::init_from_path(&dictionary)?,
            };
            debug!("Чтение XML: {:?}", start.elapsed());

            opencorpora::build(dict, data_dir.join(DICT_FILE))?;
            debug!("Сборка словаря: {:?}", start.elapsed());
        }

        Commands::Analyze => {
            let mut text = String::new();
            if std::io::stdin().read_to_string(&mut text).is_err() {
                eprintln!("stdin не является текстом в UTF-8");
                std::process::exit(2);
            }

            let start = std::time::Instant::now();
            let engine = Engine::open(&data_dir)?;
            debug!("Инициализация движка: {:?}", start.elapsed());

            for sentence in engine.process(&text)? {
                for form in sentence.tokens() {
                    match form.kind() {
                        TokenType::Word if form.token().script == Some(Script::Cyrillic) => {
                            // Для кириллицы печатается выбранный разбор.
                            if let Some(best) = form.best() {
                                println!("{}\t{}\t{:.4}", best.lemma, best.tag, best.probability);
                            }
                        }
                        TokenType::Word => println!("{}\tLATN\t1.0000", form.text()),
                        TokenType::Numb => println!("{}\tNUMB\t1.0000", form.text()),
                        TokenType::Pnct => println!("{}\tPNCT\t1.0000", form.text()),
                        TokenType::Sepr | TokenType::Other => {}
                    }
                }
            }
        }
    };

    Ok(())
}
