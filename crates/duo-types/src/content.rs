/// Fixed content tables and user-facing strings.
///
/// Everything here is addressed by deterministic selection (see `pick`), so
/// ORDER MATTERS: inserting or reordering entries changes which note every
/// deployed room unlocks for a given day. Append only.

pub const LOVE_NOTES: &[&str] = &[
    "Je fais semblant d’être sage… mais je pense à toi tout le temps 😇",
    "Mon programme du jour : te manquer. Encore.",
    "J’ai mis ton prénom dans ma to-do list ✅",
    "Je suis en manque… de toi. Et de tes câlins.",
    "Mon cœur a demandé un remboursement de distance.",
    "Bientôt je reviens te coller. Officiellement.",
    "Je te préviens : je vais te faire perdre ton espace vital 💞",
    "À ce stade, tu es littéralement mon obsession préférée.",
    "Je t’attends… mais je boude un peu 😤💖",
    "Si tu veux savoir où je suis : dans tes pensées 😌",
    "Prépare-toi… je vais te dévorer de bisous 💋",
    "J’ai hâte de te revoir… et de ne plus te laisser respirer (un peu) 😇",
    "Mon corps te réclame. Voilà c’est dit 😌",
    "Je pense à toi… et c’est rarement innocent.",
    "Je vais te sauter dessus. Avec amour. Beaucoup d’amour.",
    "Je te préviens : mon câlin va durer minimum 3 heures.",
    "Quand je te revois : je t’embrasse, et après on discute (peut-être) 😈",
    "Je veux juste être dans tes bras… et y rester.",
    "Bientôt je reprends mes droits : bisous illimités ✅",
    "Je t’aime. Et je te veux. Simple.",
    "J’ai hâte de te retrouver… j’ai des intentions très claires 😇",
    "Je suis prête à te coller comme une appli inutile : impossible à supprimer 💅",
    "Je t’envoie un bisou… mais IRL ça sera une attaque.",
    "J’ai faim. De toi. Oui bon.",
    "Tu me manques au point d’être un besoin vital 😭💋",
    "Quand je te revois je fais la fille tranquille… 2 minutes.",
    "Je compte les jours… et je prépare mon plan de bisous 😈",
    "Spoiler : tu vas pas t’en sortir indemne 😘",
    "Ça devient urgent là. Urgent câlin. Urgent toi.",
];

pub const CHALLENGES: &[&str] = &[
    "Envoie-lui un message : “J’ai une annonce importante : tu me manques.”",
    "Fais une ‘review’ de ton copain : ⭐⭐⭐⭐⭐ + une phrase.",
    "Envoie un emoji qui résume ton humeur du jour + “à cause de toi”.",
    "Décris-le en 3 mots… puis ajoute “et c’est MON préféré”.",
    "Envoie “Je pense à toi” mais en version dramatique (exagérée 😭🎭).",
    "Envoie une photo de ton outfit du jour (même en pyjama 😌).",
    "Envoie un GIF qui dit EXACTEMENT ce que tu ressens.",
    "Envoie-lui : “Je te préviens… quand je te vois, je te lâche plus 😇”",
    "Envoie un vocal (5 sec) : “Je te veux là, maintenant.”",
    "Écris : “J’ai envie de…” et finis la phrase avec un truc très doux (ou pas 😈).",
    "Dis-lui : “Mon câlin de retrouvailles va durer ___ minutes”.",
    "Envoie : “J’ai pensé à toi… et c’était PAS innocent.”",
    "Envoie un message : “Tu me manques physiquement.” 😮‍💨",
    "Écris une phrase interdite : “Je serai sage…” (mens un peu).",
    "Donne-lui une mission : “Ce soir tu dois penser à moi avant de dormir.”",
    "Défi 10 secondes : chacun envoie un vocal “j’ai hâte de…”",
    "Défi souvenir : raconte un moment drôle de vous deux en 2 phrases.",
    "Défi imagination : votre prochaine soirée idéale en 3 étapes.",
    "Défi teasing : “Quand on se revoit, je te fais…” (bisou/resto/massage 😇).",
    "Défi secret : chacun écrit une chose qu’il/elle veut refaire ensemble.",
    "Défi musique : choisis une chanson qui te donne envie de l’embrasser.",
];

/// One multiple-choice question per day, picked deterministically; the
/// `answer` index is what `correct` is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: u32,
    pub question: &'static str,
    pub choices: &'static [&'static str],
    pub answer: usize,
}

pub const QUIZ_QUESTIONS: &[QuizQuestion] = &[
    QuizQuestion {
        id: 1,
        question: "Qui de nous deux s’endort en premier ?",
        choices: &["Léa", "Gauthier", "Les deux en même temps", "Personne, on papote"],
        answer: 0,
    },
    QuizQuestion {
        id: 2,
        question: "Notre premier rendez-vous, c’était…",
        choices: &["Un café", "Un ciné", "Une balade", "Un resto"],
        answer: 2,
    },
    QuizQuestion {
        id: 3,
        question: "Qui envoie le premier message le matin ?",
        choices: &["Léa", "Gauthier", "Ça dépend des jours", "Le réveil décide"],
        answer: 1,
    },
    QuizQuestion {
        id: 4,
        question: "Notre emoji officiel, c’est…",
        choices: &["💞", "😈", "🎧", "🥐"],
        answer: 0,
    },
    QuizQuestion {
        id: 5,
        question: "Qui gagne aux jeux de société ?",
        choices: &["Léa", "Gauthier", "Celui qui triche", "On ne finit jamais la partie"],
        answer: 2,
    },
    QuizQuestion {
        id: 6,
        question: "Le plat qu’on commande toujours ?",
        choices: &["Pizza", "Sushis", "Burgers", "Pâtes"],
        answer: 1,
    },
    QuizQuestion {
        id: 7,
        question: "Qui choisit le film le soir ?",
        choices: &["Léa", "Gauthier", "On scrolle 40 minutes", "Le hasard"],
        answer: 2,
    },
    QuizQuestion {
        id: 8,
        question: "Notre saison préférée à deux ?",
        choices: &["Printemps", "Été", "Automne", "Hiver"],
        answer: 3,
    },
    QuizQuestion {
        id: 9,
        question: "Qui est le plus ponctuel ?",
        choices: &["Léa", "Gauthier", "Aucun des deux", "Les deux, évidemment"],
        answer: 0,
    },
    QuizQuestion {
        id: 10,
        question: "Notre surnom le plus utilisé ?",
        choices: &["Mon cœur", "Bébé", "Chaton", "Mon amour"],
        answer: 3,
    },
    QuizQuestion {
        id: 11,
        question: "Qui prend le plus de place dans le lit ?",
        choices: &["Léa", "Gauthier", "Le chat imaginaire", "Égalité parfaite"],
        answer: 1,
    },
    QuizQuestion {
        id: 12,
        question: "Le premier “je t’aime”, il est venu de…",
        choices: &["Léa", "Gauthier", "Les deux en même temps", "Un message à 2h du matin"],
        answer: 3,
    },
];

pub fn quiz_question_by_id(id: u32) -> Option<&'static QuizQuestion> {
    QUIZ_QUESTIONS.iter().find(|q| q.id == id)
}

/// Free-text prompts for the Valentine's-only couple quiz.
pub const COUPLE_QUIZ_QUESTIONS: &[&str] = &[
    "Ton souvenir préféré de nous deux ?",
    "La chose que tu veux absolument qu’on refasse ensemble ?",
    "Ce qui t’a fait craquer en premier ?",
    "Notre prochaine destination de rêve ?",
    "Un mot pour décrire cette année à deux ?",
];

/// Seed list for the shared movie watchlist; user additions go to
/// `customMovies`.
pub const DEFAULT_MOVIES: &[&str] = &[
    "Your Name",
    "La La Land",
    "Le Fabuleux Destin d’Amélie Poulain",
    "About Time",
    "Intouchables",
    "Coco",
    "Interstellar",
    "Les Parapluies de Cherbourg",
];

/// The countdown headline under the date picker.
pub fn countdown_message(days: Option<i64>) -> String {
    match days {
        None => String::new(),
        Some(d) if d > 0 => format!("Plus que {d} jours avant de te revoir 💕"),
        Some(0) => "C’est aujourd’hui 💖💖💖".to_string(),
        Some(_) => "Je t’ai déjà retrouvé(e) ❤️".to_string(),
    }
}

pub fn milestone_label(cap: i64) -> String {
    match cap {
        0 => "Aujourd’hui 💖".to_string(),
        1 => "1 jour".to_string(),
        n => format!("{n} jours"),
    }
}

/// Mood line keyed on how close the reunion is.
pub fn vibe_line(days: Option<i64>) -> &'static str {
    match days {
        None => "",
        Some(d) if d < 0 => "On s’est déjà retrouvés… et j’en veux encore 😈",
        Some(0) => "C’est le jour J. Respire… j’arrive 💞",
        Some(d) if d <= 3 => "Ok là… c’est imminent 😈💗",
        Some(d) if d <= 7 => "Semaine finale. Je tiens plus 😭💋",
        Some(d) if d <= 14 => "Deux semaines… je commence à préparer les bisous 😇",
        Some(d) if d <= 30 => "Ça se rapproche. Et je souris bêtement.",
        Some(_) => "On avance, un jour à la fois. Team nous 💪💖",
    }
}

/// Display name for a playlist author. The two legacy participant ids map to
/// first names; anything else (a generated uuid) gets the generic label.
pub fn partner_label(who: &str) -> &'static str {
    match who {
        "lea" => "Léa",
        "gauthier" => "Gauthier",
        _ => "Quelqu’un",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_message() {
        assert_eq!(countdown_message(None), "");
        assert_eq!(countdown_message(Some(5)), "Plus que 5 jours avant de te revoir 💕");
        assert_eq!(countdown_message(Some(0)), "C’est aujourd’hui 💖💖💖");
        assert_eq!(countdown_message(Some(-1)), "Je t’ai déjà retrouvé(e) ❤️");
    }

    #[test]
    fn test_quiz_ids_unique_and_resolvable() {
        for (i, q) in QUIZ_QUESTIONS.iter().enumerate() {
            assert!(q.answer < q.choices.len(), "question {} has a bad answer index", q.id);
            assert!(
                QUIZ_QUESTIONS[i + 1..].iter().all(|other| other.id != q.id),
                "duplicate question id {}",
                q.id
            );
            assert_eq!(quiz_question_by_id(q.id), Some(q));
        }
        assert_eq!(quiz_question_by_id(9999), None);
    }

    #[test]
    fn test_milestone_label() {
        assert_eq!(milestone_label(0), "Aujourd’hui 💖");
        assert_eq!(milestone_label(1), "1 jour");
        assert_eq!(milestone_label(14), "14 jours");
    }
}
